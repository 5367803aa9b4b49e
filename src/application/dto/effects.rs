//! Side effects produced by the orchestrator
//!
//! Intent handlers never talk to sockets or spawn tasks themselves. They
//! produce `Effects`: seat bindings, messages addressed to players and timer
//! commands. The session gateway delivers the messages in order and the
//! scheduler applies the timer commands.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::dto::ServerMessage;
use crate::domain::aggregates::Room;
use crate::domain::value_objects::{PlayerId, RoomCode};

/// Unique identifier for a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(uuid::Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which connection speaks for which player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatCommand {
    /// Applied before the messages of the same batch
    Attach {
        client: ClientId,
        room: RoomCode,
        player: PlayerId,
    },
    /// Applied after the messages of the same batch
    Detach { player: PlayerId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub recipients: Vec<PlayerId>,
    pub message: ServerMessage,
}

/// Scheduled work, keyed so it can be replaced or cancelled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Shop countdown for the break that follows `round`
    BreakEnd { room: RoomCode, round: u32 },
    /// Pre-battle window of `round`'s duels
    PreBattle { room: RoomCode, round: u32 },
    ReconnectGrace { room: RoomCode, player: PlayerId },
    BotTick { room: RoomCode },
}

impl TimerKey {
    pub fn room(&self) -> &RoomCode {
        match self {
            TimerKey::BreakEnd { room, .. }
            | TimerKey::PreBattle { room, .. }
            | TimerKey::ReconnectGrace { room, .. }
            | TimerKey::BotTick { room } => room,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Schedule { key: TimerKey, after: Duration },
    Cancel(TimerKey),
    /// Drop every timer belonging to a room
    CancelRoom(RoomCode),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    pub seats: Vec<SeatCommand>,
    pub messages: Vec<Envelope>,
    pub timers: Vec<TimerCommand>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, client: ClientId, room: RoomCode, player: PlayerId) {
        self.seats.push(SeatCommand::Attach {
            client,
            room,
            player,
        });
    }

    pub fn detach(&mut self, player: PlayerId) {
        self.seats.push(SeatCommand::Detach { player });
    }

    pub fn send(&mut self, recipients: Vec<PlayerId>, message: ServerMessage) {
        if !recipients.is_empty() {
            self.messages.push(Envelope {
                recipients,
                message,
            });
        }
    }

    pub fn send_to(&mut self, player: PlayerId, message: ServerMessage) {
        self.send(vec![player], message);
    }

    /// Every member of the room, connected or not
    pub fn broadcast(&mut self, room: &Room, message: ServerMessage) {
        self.send(room.member_ids(), message);
    }

    pub fn broadcast_except(&mut self, room: &Room, exclude: PlayerId, message: ServerMessage) {
        let recipients = room
            .member_ids()
            .into_iter()
            .filter(|id| *id != exclude)
            .collect();
        self.send(recipients, message);
    }

    pub fn schedule(&mut self, key: TimerKey, after: Duration) {
        self.timers.push(TimerCommand::Schedule { key, after });
    }

    pub fn cancel(&mut self, key: TimerKey) {
        self.timers.push(TimerCommand::Cancel(key));
    }

    pub fn cancel_room(&mut self, room: RoomCode) {
        self.timers.push(TimerCommand::CancelRoom(room));
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty() && self.messages.is_empty() && self.timers.is_empty()
    }

    /// Messages addressed to `player`, in delivery order
    #[cfg(test)]
    pub fn messages_for(&self, player: PlayerId) -> impl Iterator<Item = &ServerMessage> {
        self.messages
            .iter()
            .filter(move |e| e.recipients.contains(&player))
            .map(|e| &e.message)
    }
}
