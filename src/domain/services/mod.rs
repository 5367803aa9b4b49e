//! Domain services - Pure game rules with no I/O

pub mod abilities;
pub mod combat_resolver;
pub mod economy;
pub mod outcome_generator;

pub use abilities::{apply_ability, resolve_effect};
pub use combat_resolver::{resolve_attack, AttackOutcome, ComboInfo};
pub use outcome_generator::draw_grid;
