//! Recoverable rejections of player intents
//!
//! None of these are fatal to a room. They are reported only to the client
//! that sent the intent, which may retry once the condition clears.

use crate::domain::value_objects::RoomCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),

    #[error("Room is full ({0} players)")]
    RoomFull(usize),

    #[error("A round is in progress")]
    RoundInProgress,

    #[error("Unknown character: {0}")]
    InvalidCharacter(String),

    #[error("Character already selected")]
    AlreadySelected,

    #[error("You have no active duel")]
    NoActiveDuel,

    #[error("You are not in a duel")]
    NotInDuel,

    #[error("Turn already ended")]
    TurnAlreadyEnded,

    #[error("Opponent already defeated")]
    OpponentDefeated,

    #[error("Battle starts in {remaining_secs}s")]
    BattleNotStarted { remaining_secs: u64, remaining_ms: u64 },

    #[error("Not enough gold: need {needed}, have {available}")]
    InsufficientGold { needed: u32, available: u32 },

    #[error("Recharging for another {remaining_ms}ms")]
    Recharging { remaining_ms: u64 },

    #[error("You are not in this room")]
    NotInRoom,

    #[error("You are already in this room")]
    AlreadyJoined,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Not allowed during {0}")]
    InvalidPhase(&'static str),

    #[error("No player has selected a character")]
    NoEligiblePlayers,

    #[error("Tournament already finished")]
    TournamentFinished,

    #[error("Unknown player")]
    UnknownPlayer,

    #[error("That player is still connected")]
    SeatOccupied,

    #[error("Invalid upgrade: {0}")]
    InvalidUpgrade(String),
}

impl GameError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::RoomFull(_) => "ROOM_FULL",
            Self::RoundInProgress => "ROUND_IN_PROGRESS",
            Self::InvalidCharacter(_) => "INVALID_CHARACTER",
            Self::AlreadySelected => "ALREADY_SELECTED",
            Self::NoActiveDuel => "NO_ACTIVE_DUEL",
            Self::NotInDuel => "NOT_IN_DUEL",
            Self::TurnAlreadyEnded => "TURN_ALREADY_ENDED",
            Self::OpponentDefeated => "OPPONENT_DEFEATED",
            Self::BattleNotStarted { .. } => "BATTLE_NOT_STARTED",
            Self::InsufficientGold { .. } => "INSUFFICIENT_GOLD",
            Self::Recharging { .. } => "RECHARGING",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::AlreadyJoined => "ALREADY_JOINED",
            Self::NotHost => "NOT_HOST",
            Self::InvalidPhase(_) => "INVALID_PHASE",
            Self::NoEligiblePlayers => "NO_ELIGIBLE_PLAYERS",
            Self::TournamentFinished => "TOURNAMENT_FINISHED",
            Self::UnknownPlayer => "UNKNOWN_PLAYER",
            Self::SeatOccupied => "SEAT_OCCUPIED",
            Self::InvalidUpgrade(_) => "INVALID_UPGRADE",
        }
    }

    /// How long the client should wait before retrying, if known
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::BattleNotStarted { remaining_ms, .. } => Some(*remaining_ms),
            Self::Recharging { remaining_ms } => Some(*remaining_ms),
            _ => None,
        }
    }
}
