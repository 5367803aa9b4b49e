//! Character ability dispatch

use crate::domain::entities::{Ability, Player, Trigger};

/// The ability effect a player's character produces at `trigger`, if any.
pub fn apply_ability(player: &Player, trigger: Trigger) -> Option<Ability> {
    let ability = player.character?.profile().ability;
    (ability.trigger() == trigger).then_some(ability)
}

/// Apply an effect to its owner. Returns the amount that actually took hold.
pub fn resolve_effect(player: &mut Player, effect: Ability) -> u32 {
    match effect {
        Ability::GoldBonus(amount) => {
            player.temporary_gold += amount;
            amount
        }
        Ability::Heal(amount) => player.heal_total(amount),
        Ability::Block(amount) => {
            player.shield = amount;
            amount
        }
        Ability::Damage(amount) => {
            player.rage = amount;
            amount
        }
    }
}
