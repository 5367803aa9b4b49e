//! Client-facing views of room state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{Room, RoomPhase};
use crate::domain::entities::{
    CharacterKind, Duel, DuelResult, DuelStanding, DuelStatus, Player,
};
use crate::domain::value_objects::{DuelId, PlayerId, RoomCode, StylePoints};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub character_id: Option<CharacterKind>,
    pub is_bot: bool,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
    pub round_hp: u32,
    pub max_round_hp: u32,
    pub total_hp: u32,
    pub permanent_gold: u32,
    pub temporary_gold: u32,
    pub win_streak: u32,
    pub lose_streak: u32,
    pub wins: u32,
    pub losses: u32,
    pub is_in_duel: bool,
    pub duel_opponent_id: Option<PlayerId>,
    pub duel_start_time: Option<DateTime<Utc>>,
    pub has_ended_turn: bool,
    pub duel_status: Option<DuelStanding>,
    pub shield: u32,
    pub recharge_until: Option<DateTime<Utc>>,
    pub is_eliminated: bool,
    pub is_connected: bool,
    /// Set while the seat is held for a reconnect
    pub disconnected_at: Option<DateTime<Utc>>,
    pub is_abandoned: bool,
    pub style: StylePoints,
}

impl PlayerView {
    pub fn from_player(player: &Player, host: Option<PlayerId>) -> Self {
        Self {
            id: player.id,
            nickname: player.nickname.clone(),
            character_id: player.character,
            is_bot: player.is_bot,
            is_host: host == Some(player.id),
            joined_at: player.joined_at,
            round_hp: player.round_hp,
            max_round_hp: player.max_round_hp(),
            total_hp: player.total_hp,
            permanent_gold: player.permanent_gold,
            temporary_gold: player.temporary_gold,
            win_streak: player.win_streak,
            lose_streak: player.lose_streak,
            wins: player.wins,
            losses: player.losses,
            is_in_duel: player.is_in_duel,
            duel_opponent_id: player.duel_opponent_id,
            duel_start_time: player.duel_start_time,
            has_ended_turn: player.has_ended_turn,
            duel_status: player.duel_status,
            shield: player.shield,
            recharge_until: player.recharge_until,
            is_eliminated: player.is_eliminated,
            is_connected: player.is_connected,
            disconnected_at: player.disconnected_at,
            is_abandoned: player.is_abandoned,
            style: player.style,
        }
    }
}

/// One bracket entry. `player2` is empty for a bye.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairView {
    pub duel_id: DuelId,
    pub round: u32,
    pub player1: PlayerId,
    pub player2: Option<PlayerId>,
    pub status: DuelStatus,
    pub start_time: DateTime<Utc>,
    pub result: Option<DuelResult>,
}

impl From<&Duel> for PairView {
    fn from(duel: &Duel) -> Self {
        Self {
            duel_id: duel.id,
            round: duel.round,
            player1: duel.first,
            player2: duel.second,
            status: duel.status(),
            start_time: duel.start_time,
            result: duel.result().copied(),
        }
    }
}

/// Full, self-consistent picture of a room at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomCode,
    pub phase: RoomPhase,
    pub host_id: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub pairs: Vec<PairView>,
    pub current_round: u32,
}

impl RoomSnapshot {
    pub fn of(room: &Room) -> Self {
        Self {
            room_id: room.code().clone(),
            phase: room.phase(),
            host_id: room.host(),
            players: room
                .players()
                .iter()
                .map(|p| PlayerView::from_player(p, room.host()))
                .collect(),
            pairs: pairs_of(room),
            current_round: room.round(),
        }
    }
}

pub fn pairs_of(room: &Room) -> Vec<PairView> {
    room.bracket().iter().map(PairView::from).collect()
}

/// Lobby listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomCode,
    pub host_nickname: Option<String>,
    pub player_count: usize,
    pub phase: RoomPhase,
    pub current_round: u32,
    pub created_at: DateTime<Utc>,
}

impl RoomSummary {
    pub fn of(room: &Room) -> Self {
        Self {
            room_id: room.code().clone(),
            host_nickname: room
                .host()
                .and_then(|id| room.player(id))
                .map(|p| p.nickname.clone()),
            player_count: room.players().len(),
            phase: room.phase(),
            current_round: room.round(),
            created_at: room.created_at(),
        }
    }
}
