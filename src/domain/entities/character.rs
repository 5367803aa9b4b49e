//! Character roster - the fixed set of fighters a player can pick

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::CombatStats;

/// Identifies one of the fixed roster entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterKind {
    Merchant,
    Healer,
    Guardian,
    Berserker,
}

impl CharacterKind {
    pub const ROSTER: [CharacterKind; 4] = [
        CharacterKind::Merchant,
        CharacterKind::Healer,
        CharacterKind::Guardian,
        CharacterKind::Berserker,
    ];

    /// Look up a roster entry by its client-facing id
    pub fn parse(id: &str) -> Option<Self> {
        Self::ROSTER
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(id.trim()))
    }

    pub fn id(self) -> &'static str {
        match self {
            CharacterKind::Merchant => "merchant",
            CharacterKind::Healer => "healer",
            CharacterKind::Guardian => "guardian",
            CharacterKind::Berserker => "berserker",
        }
    }

    pub fn profile(self) -> Character {
        match self {
            CharacterKind::Merchant => Character {
                stats: CombatStats {
                    attack: 0,
                    armor: 5,
                    dodge: 5,
                    crit: 5,
                    crit_multiplier: 150,
                },
                hp_bonus: 0,
                ability: Ability::GoldBonus(10),
            },
            CharacterKind::Healer => Character {
                stats: CombatStats {
                    attack: 0,
                    armor: 5,
                    dodge: 10,
                    crit: 5,
                    crit_multiplier: 150,
                },
                hp_bonus: 10,
                ability: Ability::Heal(8),
            },
            CharacterKind::Guardian => Character {
                stats: CombatStats {
                    attack: 0,
                    armor: 20,
                    dodge: 0,
                    crit: 5,
                    crit_multiplier: 150,
                },
                hp_bonus: 30,
                ability: Ability::Block(15),
            },
            CharacterKind::Berserker => Character {
                stats: CombatStats {
                    attack: 20,
                    armor: 0,
                    dodge: 5,
                    crit: 15,
                    crit_multiplier: 175,
                },
                hp_bonus: 0,
                ability: Ability::Damage(4),
            },
        }
    }
}

impl std::fmt::Display for CharacterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Point in the tournament at which abilities fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    RoundStart,
    DuelStart,
}

/// A character's signature ability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "camelCase")]
pub enum Ability {
    /// Extra temporary gold at round start
    GoldBonus(u32),
    /// Restores total HP at duel start
    Heal(u32),
    /// Absorbs incoming damage for the duel
    Block(u32),
    /// Flat damage added to every landed hit for the duel
    Damage(u32),
}

impl Ability {
    pub fn trigger(self) -> Trigger {
        match self {
            Ability::GoldBonus(_) => Trigger::RoundStart,
            Ability::Heal(_) | Ability::Block(_) | Ability::Damage(_) => Trigger::DuelStart,
        }
    }
}

/// Static profile of a roster entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    pub stats: CombatStats,
    /// Added to the base round HP
    pub hp_bonus: u32,
    pub ability: Ability,
}
