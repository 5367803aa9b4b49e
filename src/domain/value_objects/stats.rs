//! Combat stats and shop-bought style points

use serde::{Deserialize, Serialize};

/// Upgradeable combat stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatKind {
    Attack,
    Armor,
    Dodge,
    Crit,
    CritMultiplier,
}

impl StatKind {
    pub const ALL: [StatKind; 5] = [
        StatKind::Attack,
        StatKind::Armor,
        StatKind::Dodge,
        StatKind::Crit,
        StatKind::CritMultiplier,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StatKind::Attack => "attack",
            StatKind::Armor => "armor",
            StatKind::Dodge => "dodge",
            StatKind::Crit => "crit",
            StatKind::CritMultiplier => "critMultiplier",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat| stat.id() == id.trim())
    }
}

/// Style points thresholds and the flat bonus each one unlocks
const STYLE_STEPS: [(u32, u32); 3] = [(20, 15), (10, 10), (4, 5)];

/// Bonus granted for a given number of style points in one stat.
pub fn style_bonus(points: u32) -> u32 {
    STYLE_STEPS
        .iter()
        .find(|(threshold, _)| points >= *threshold)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

/// Style points a player has bought, per stat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePoints {
    pub attack: u32,
    pub armor: u32,
    pub dodge: u32,
    pub crit: u32,
    pub crit_multiplier: u32,
}

impl StylePoints {
    pub fn get(&self, stat: StatKind) -> u32 {
        match stat {
            StatKind::Attack => self.attack,
            StatKind::Armor => self.armor,
            StatKind::Dodge => self.dodge,
            StatKind::Crit => self.crit,
            StatKind::CritMultiplier => self.crit_multiplier,
        }
    }

    pub fn add(&mut self, stat: StatKind, points: u32) {
        let slot = match stat {
            StatKind::Attack => &mut self.attack,
            StatKind::Armor => &mut self.armor,
            StatKind::Dodge => &mut self.dodge,
            StatKind::Crit => &mut self.crit,
            StatKind::CritMultiplier => &mut self.crit_multiplier,
        };
        *slot += points;
    }

    pub fn bonus(&self, stat: StatKind) -> u32 {
        style_bonus(self.get(stat))
    }
}

/// Effective combat stats, all in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatStats {
    /// Added to raw damage as a percentage
    pub attack: u32,
    /// Percentage of incoming damage removed
    pub armor: u32,
    /// Chance to avoid a hit entirely
    pub dodge: u32,
    /// Chance to land a critical hit
    pub crit: u32,
    /// Damage multiplier on crit, e.g. 150 for x1.5
    pub crit_multiplier: u32,
}

impl CombatStats {
    /// Base stats plus the stepped style bonus for each stat.
    pub fn with_style(self, style: &StylePoints) -> Self {
        Self {
            attack: self.attack + style.bonus(StatKind::Attack),
            armor: self.armor + style.bonus(StatKind::Armor),
            dodge: self.dodge + style.bonus(StatKind::Dodge),
            crit: self.crit + style.bonus(StatKind::Crit),
            crit_multiplier: self.crit_multiplier + style.bonus(StatKind::CritMultiplier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_ids_match_wire_names() {
        for stat in StatKind::ALL {
            let json = serde_json::to_value(stat).unwrap();
            assert_eq!(json, stat.id());
            assert_eq!(StatKind::parse(stat.id()), Some(stat));
        }
        assert_eq!(StatKind::parse("luck"), None);
    }

    #[test]
    fn test_style_bonus_steps() {
        assert_eq!(style_bonus(0), 0);
        assert_eq!(style_bonus(3), 0);
        assert_eq!(style_bonus(4), 5);
        assert_eq!(style_bonus(9), 5);
        assert_eq!(style_bonus(10), 10);
        assert_eq!(style_bonus(19), 10);
        assert_eq!(style_bonus(20), 15);
        assert_eq!(style_bonus(100), 15);
    }

    #[test]
    fn test_with_style_only_touches_upgraded_stats() {
        let base = CombatStats {
            attack: 10,
            armor: 5,
            dodge: 5,
            crit: 10,
            crit_multiplier: 150,
        };
        let mut style = StylePoints::default();
        style.add(StatKind::Armor, 10);
        style.add(StatKind::Crit, 4);

        let effective = base.with_style(&style);
        assert_eq!(effective.attack, 10);
        assert_eq!(effective.armor, 15);
        assert_eq!(effective.crit, 15);
        assert_eq!(effective.crit_multiplier, 150);
    }
}
