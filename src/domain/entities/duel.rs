//! Duel entity - one 1v1 encounter within a round
//!
//! A duel only references its combatants by id. Their HP, gold and turn
//! flags live on the room's `Player` records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DuelId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuelStatus {
    Forming,
    Preparing,
    Active,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionReason {
    /// A combatant's round HP reached zero
    Knockout,
    /// Both combatants ended their turn
    TurnsEnded,
    /// A combatant left or never came back
    Forfeit,
    /// Unpaired survivor advanced without combat
    Bye,
}

/// Final result of a duel. No winner and no loser means a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelResult {
    pub winner: Option<PlayerId>,
    pub loser: Option<PlayerId>,
    pub reason: ResolutionReason,
}

impl DuelResult {
    pub fn decisive(winner: PlayerId, loser: PlayerId, reason: ResolutionReason) -> Self {
        Self {
            winner: Some(winner),
            loser: Some(loser),
            reason,
        }
    }

    pub fn bye(winner: PlayerId) -> Self {
        Self {
            winner: Some(winner),
            loser: None,
            reason: ResolutionReason::Bye,
        }
    }

    pub fn draw() -> Self {
        Self {
            winner: None,
            loser: None,
            reason: ResolutionReason::TurnsEnded,
        }
    }

    pub fn is_draw(&self) -> bool {
        self.winner.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Duel {
    pub id: DuelId,
    pub round: u32,
    pub first: PlayerId,
    /// `None` for a bye
    pub second: Option<PlayerId>,
    pub start_time: DateTime<Utc>,
    status: DuelStatus,
    result: Option<DuelResult>,
}

impl Duel {
    /// Form a duel and move it straight into its pre-battle window
    pub fn form(round: u32, first: PlayerId, second: Option<PlayerId>, now: DateTime<Utc>) -> Self {
        let mut duel = Self {
            id: DuelId::new(),
            round,
            first,
            second,
            start_time: now,
            status: DuelStatus::Forming,
            result: None,
        };
        duel.status = DuelStatus::Preparing;
        duel
    }

    pub fn status(&self) -> DuelStatus {
        self.status
    }

    pub fn result(&self) -> Option<&DuelResult> {
        self.result.as_ref()
    }

    pub fn is_bye(&self) -> bool {
        self.second.is_none()
    }

    pub fn is_resolved(&self) -> bool {
        self.status == DuelStatus::Resolved
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        std::iter::once(self.first).chain(self.second)
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.first == player || self.second == Some(player)
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        if self.first == player {
            self.second
        } else if self.second == Some(player) {
            Some(self.first)
        } else {
            None
        }
    }

    /// Time left in the pre-battle window, if still preparing
    pub fn preparing_remaining(&self, now: DateTime<Utc>, delay: Duration) -> Option<Duration> {
        if self.status != DuelStatus::Preparing {
            return None;
        }
        let remaining = self.start_time + delay - now;
        (remaining > Duration::zero()).then_some(remaining)
    }

    /// Promote `Preparing -> Active` once the pre-battle delay has elapsed.
    /// Returns true if this call made the transition.
    pub fn activate_if_due(&mut self, now: DateTime<Utc>, delay: Duration) -> bool {
        if self.status == DuelStatus::Preparing && now >= self.start_time + delay {
            self.status = DuelStatus::Active;
            true
        } else {
            false
        }
    }

    /// Enter `Resolved` exactly once. Later calls return `None` and leave the
    /// stored result untouched.
    pub fn resolve(&mut self, result: DuelResult) -> Option<DuelResult> {
        if self.status == DuelStatus::Resolved {
            return None;
        }
        self.status = DuelStatus::Resolved;
        self.result = Some(result);
        Some(result)
    }
}
