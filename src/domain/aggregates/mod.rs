//! Aggregates - Cluster of domain objects treated as a single unit

pub mod room;

pub use room::{GameStart, Resolution, Room, RoomPhase, RoundEnd, SpinOutcome, TurnEnd};
