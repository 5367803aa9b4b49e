//! Value objects - Immutable objects defined by their attributes

mod ids;
mod room_code;
mod stats;
mod symbols;

pub use ids::*;
pub use room_code::RoomCode;
pub use stats::{CombatStats, StatKind, StylePoints};
pub use symbols::{Grid, Row, Symbol, GRID_COLUMNS, GRID_ROWS};
