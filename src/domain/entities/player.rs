//! Player entity - a participant's persistent state within one room

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::CharacterKind;
use crate::domain::errors::GameError;
use crate::domain::value_objects::{CombatStats, PlayerId, ReconnectToken, StatKind, StylePoints};

pub const TOTAL_HP_MAX: u32 = 100;
pub const ROUND_HP_BASE: u32 = 100;
pub const ROUND_HP_MAX: u32 = 200;

/// Outcome of the player's current or last duel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuelStanding {
    Winner,
    Loser,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub character: Option<CharacterKind>,
    pub is_bot: bool,
    pub joined_at: DateTime<Utc>,
    /// Only ever sent to this player's own connection
    pub reconnect_token: ReconnectToken,

    /// Reset every duel
    pub round_hp: u32,
    /// Persists across the tournament; reaching 0 eliminates the player
    pub total_hp: u32,

    pub permanent_gold: u32,
    /// Spent before permanent gold, cleared at round end
    pub temporary_gold: u32,

    pub win_streak: u32,
    pub lose_streak: u32,
    pub wins: u32,
    pub losses: u32,

    // Duel state
    pub is_in_duel: bool,
    pub duel_opponent_id: Option<PlayerId>,
    pub duel_start_time: Option<DateTime<Utc>>,
    pub has_ended_turn: bool,
    pub duel_status: Option<DuelStanding>,
    /// Remaining damage absorption granted by a block ability
    pub shield: u32,
    /// Flat bonus added to every landed hit this duel
    pub rage: u32,
    pub recharge_until: Option<DateTime<Utc>>,

    pub is_eliminated: bool,
    pub is_connected: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
    /// Set once the reconnect grace window lapsed. Still paired, but every
    /// duel is forfeited until the player comes back.
    pub is_abandoned: bool,

    pub style: StylePoints,
}

impl Player {
    pub fn new(nickname: impl Into<String>, is_bot: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: PlayerId::new(),
            nickname: nickname.into(),
            character: None,
            is_bot,
            joined_at: now,
            reconnect_token: ReconnectToken::new(),
            round_hp: ROUND_HP_BASE,
            total_hp: TOTAL_HP_MAX,
            permanent_gold: 0,
            temporary_gold: 0,
            win_streak: 0,
            lose_streak: 0,
            wins: 0,
            losses: 0,
            is_in_duel: false,
            duel_opponent_id: None,
            duel_start_time: None,
            has_ended_turn: false,
            duel_status: None,
            shield: 0,
            rage: 0,
            recharge_until: None,
            is_eliminated: false,
            is_connected: true,
            disconnected_at: None,
            is_abandoned: false,
            style: StylePoints::default(),
        }
    }

    pub fn total_gold(&self) -> u32 {
        self.temporary_gold + self.permanent_gold
    }

    /// Debit gold, temporary first. Leaves both balances untouched on failure.
    pub fn spend(&mut self, amount: u32) -> Result<(), GameError> {
        let available = self.total_gold();
        if available < amount {
            return Err(GameError::InsufficientGold {
                needed: amount,
                available,
            });
        }
        let from_temporary = amount.min(self.temporary_gold);
        self.temporary_gold -= from_temporary;
        self.permanent_gold -= amount - from_temporary;
        Ok(())
    }

    pub fn record_win(&mut self) {
        self.wins += 1;
        self.win_streak += 1;
        self.lose_streak = 0;
    }

    pub fn record_loss(&mut self) {
        self.losses += 1;
        self.lose_streak += 1;
        self.win_streak = 0;
    }

    /// Round HP a fresh duel starts with
    pub fn max_round_hp(&self) -> u32 {
        let bonus = self.character.map(|c| c.profile().hp_bonus).unwrap_or(0);
        (ROUND_HP_BASE + bonus).min(ROUND_HP_MAX)
    }

    pub fn combat_stats(&self) -> CombatStats {
        let base = self
            .character
            .map(|c| c.profile().stats)
            .unwrap_or(CombatStats {
                attack: 0,
                armor: 0,
                dodge: 0,
                crit: 0,
                crit_multiplier: 100,
            });
        base.with_style(&self.style)
    }

    pub fn add_style_point(&mut self, stat: StatKind) {
        self.style.add(stat, 1);
    }

    /// Survivors are paired into the next bracket. Absence never removes a
    /// player from the tournament; only running out of total HP does.
    pub fn is_survivor(&self) -> bool {
        !self.is_eliminated && self.character.is_some()
    }

    pub fn enter_duel(&mut self, opponent: Option<PlayerId>, now: DateTime<Utc>) {
        self.round_hp = self.max_round_hp();
        self.is_in_duel = opponent.is_some();
        self.duel_opponent_id = opponent;
        self.duel_start_time = Some(now);
        self.has_ended_turn = false;
        self.duel_status = None;
        self.shield = 0;
        self.rage = 0;
        self.recharge_until = None;
    }

    /// Apply damage to round HP, absorbing with the shield first.
    /// Returns the amount actually taken off round HP.
    pub fn take_hit(&mut self, damage: u32) -> u32 {
        let absorbed = damage.min(self.shield);
        self.shield -= absorbed;
        let taken = (damage - absorbed).min(self.round_hp);
        self.round_hp -= taken;
        taken
    }

    pub fn heal_total(&mut self, amount: u32) -> u32 {
        let healed = amount.min(TOTAL_HP_MAX - self.total_hp);
        self.total_hp += healed;
        healed
    }

    pub fn leave_duel(&mut self, standing: Option<DuelStanding>) {
        self.is_in_duel = false;
        self.has_ended_turn = false;
        self.duel_status = standing;
        self.shield = 0;
        self.rage = 0;
        self.recharge_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new("Alice", false, Utc::now())
    }

    #[test]
    fn test_spend_uses_temporary_gold_first() {
        let mut p = player();
        p.temporary_gold = 3;
        p.permanent_gold = 10;

        p.spend(5).unwrap();

        assert_eq!(p.temporary_gold, 0);
        assert_eq!(p.permanent_gold, 8);
        assert_eq!(p.total_gold(), 8);
    }

    #[test]
    fn test_spend_rejects_without_mutation() {
        let mut p = player();
        p.temporary_gold = 2;
        p.permanent_gold = 1;

        let err = p.spend(5).unwrap_err();

        assert_eq!(
            err,
            GameError::InsufficientGold {
                needed: 5,
                available: 3
            }
        );
        assert_eq!(p.temporary_gold, 2);
        assert_eq!(p.permanent_gold, 1);
    }

    #[test]
    fn test_streaks_are_mutually_exclusive() {
        let mut p = player();
        p.record_win();
        p.record_win();
        assert_eq!((p.win_streak, p.lose_streak), (2, 0));

        p.record_loss();
        assert_eq!((p.win_streak, p.lose_streak), (0, 1));
        assert_eq!((p.wins, p.losses), (2, 1));

        p.record_win();
        assert_eq!((p.win_streak, p.lose_streak), (1, 0));
    }

    #[test]
    fn test_shield_absorbs_before_round_hp() {
        let mut p = player();
        p.shield = 15;
        assert_eq!(p.take_hit(10), 0);
        assert_eq!(p.shield, 5);
        assert_eq!(p.take_hit(20), 15);
        assert_eq!(p.round_hp, ROUND_HP_BASE - 15);
    }

    #[test]
    fn test_round_hp_floors_at_zero() {
        let mut p = player();
        let taken = p.take_hit(500);
        assert_eq!(taken, ROUND_HP_BASE);
        assert_eq!(p.round_hp, 0);
    }

    #[test]
    fn test_guardian_round_hp_bonus() {
        let mut p = player();
        p.character = Some(CharacterKind::Guardian);
        assert_eq!(p.max_round_hp(), 130);
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut p = player();
        p.total_hp = 95;
        assert_eq!(p.heal_total(8), 5);
        assert_eq!(p.total_hp, TOTAL_HP_MAX);
    }
}
