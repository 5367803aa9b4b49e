//! Domain layer - Core game rules with no I/O
//!
//! This layer contains:
//! - Entities: Player, Duel, the character roster
//! - Value Objects: ids, room codes, reel symbols, combat stats
//! - Aggregates: the Room aggregate root
//! - Domain Services: outcome generation, combat resolution, economy
//! - Errors: recoverable intent rejections

pub mod aggregates;
pub mod entities;
pub mod errors;
pub mod services;
pub mod value_objects;
