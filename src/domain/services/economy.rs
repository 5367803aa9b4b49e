//! Spin economy - costs, recharge, rewards and streak bonuses

use chrono::{DateTime, Duration, Utc};

use crate::domain::errors::GameError;

pub const SPIN_COST: u32 = 5;
pub const RECHARGE_MS: i64 = 3_000;
pub const RECHARGE_PENALTY_MS: i64 = 2_000;

/// Temporary gold every combatant gets when a round starts
pub const ROUND_TEMP_GOLD: u32 = 30;
pub const ROUND_END_GOLD: u32 = 10;
pub const WIN_GOLD_BONUS: u32 = 5;
pub const UPGRADE_COST: u32 = 10;

const WIN_STREAK_STEP: u32 = 5;
const WIN_STREAK_CAP: u32 = 50;
const LOSE_STREAK_STEP: u32 = 3;
const LOSE_STREAK_CAP: u32 = 30;

const TOTAL_HP_LOSS_BASE: u32 = 15;

/// Percentage bonus on round-end gold. Streak counters are mutually
/// exclusive, so at most one of the two terms is non-zero.
pub fn streak_bonus_percent(win_streak: u32, lose_streak: u32) -> u32 {
    if win_streak > 0 {
        (win_streak * WIN_STREAK_STEP).min(WIN_STREAK_CAP)
    } else {
        (lose_streak * LOSE_STREAK_STEP).min(LOSE_STREAK_CAP)
    }
}

pub fn round_end_gold(won: bool, win_streak: u32, lose_streak: u32) -> u32 {
    let base = ROUND_END_GOLD + if won { WIN_GOLD_BONUS } else { 0 };
    base * (100 + streak_bonus_percent(win_streak, lose_streak)) / 100
}

/// Total HP the loser of a duel gives up
pub fn total_hp_loss(winner_round_hp: u32) -> u32 {
    TOTAL_HP_LOSS_BASE + winner_round_hp / 10
}

/// Enforce the per-spin cooldown.
///
/// Attempting a spin while recharging pushes the deadline out by
/// `RECHARGE_PENALTY_MS` and reports the new remaining time.
pub fn enforce_recharge(
    recharge_until: &mut Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    match *recharge_until {
        Some(until) if until > now => {
            let extended = until + Duration::milliseconds(RECHARGE_PENALTY_MS);
            *recharge_until = Some(extended);
            Err(GameError::Recharging {
                remaining_ms: (extended - now).num_milliseconds().max(0) as u64,
            })
        }
        _ => Ok(()),
    }
}

pub fn recharge_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::milliseconds(RECHARGE_MS)
}
