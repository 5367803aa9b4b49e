//! Domain entities - Core business objects with identity

mod character;
mod duel;
mod player;

pub use character::{Ability, CharacterKind, Trigger};
pub use duel::{Duel, DuelResult, DuelStatus, ResolutionReason};
pub use player::{DuelStanding, Player};
