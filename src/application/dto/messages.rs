//! Messages from the engine to clients

use serde::{Deserialize, Serialize};

use crate::application::dto::{PairView, PlayerView, RoomSnapshot, RoomSummary};
use crate::domain::errors::GameError;
use crate::domain::services::ComboInfo;
use crate::domain::value_objects::{PlayerId, ReconnectToken, RoomCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent to the creator of a new room
    RoomCreated {
        room_id: RoomCode,
        player_id: PlayerId,
        reconnect_token: ReconnectToken,
        room: RoomSnapshot,
    },
    /// Sent to a player who joined or rejoined
    RoomJoined {
        room_id: RoomCode,
        player_id: PlayerId,
        reconnect_token: ReconnectToken,
        room: RoomSnapshot,
    },
    /// Broadcast to everyone else in the room
    PlayerJoined { player: PlayerView },
    PlayerLeft { player_id: PlayerId, nickname: String },
    RoomsList { rooms: Vec<RoomSummary> },
    BecameHost { player_id: PlayerId },
    /// Full snapshot after every state change
    RoomStateUpdate {
        #[serde(flatten)]
        room: RoomSnapshot,
    },
    RoundStarted { round: u32, pairs: Vec<PairView> },
    /// Shop phase began; duration in seconds
    BreakStarted { duration: u64 },
    Attack {
        from_player_id: PlayerId,
        target_player_id: PlayerId,
        damage: u32,
        dodged: bool,
        crit: bool,
        combo_info: ComboInfo,
    },
    Heal { player_id: PlayerId, heal_amount: u32 },
    TurnEnded { player_id: PlayerId },
    GameEnded { winner: Option<PlayerView> },
    RoomError {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },
    Pong,
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RoomError {
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }
}

impl From<&GameError> for ServerMessage {
    fn from(err: &GameError) -> Self {
        Self::RoomError {
            code: err.code().to_string(),
            message: err.to_string(),
            retry_after_ms: err.retry_after_ms(),
        }
    }
}
