//! Data transfer objects shared between the orchestrator and the gateway

mod effects;
mod messages;
mod views;

pub use effects::{ClientId, Effects, Envelope, SeatCommand, TimerCommand, TimerKey};
pub use messages::ServerMessage;
pub use views::{pairs_of, PairView, PlayerView, RoomSnapshot, RoomSummary};
