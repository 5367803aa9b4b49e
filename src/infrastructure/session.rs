//! Session management for WebSocket connections
//!
//! Tracks every open connection, binds connections to the (room, player)
//! seat they speak for, and fans orchestrator messages out through each
//! connection's channel.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::application::dto::{ClientId, Envelope, SeatCommand, ServerMessage};
use crate::domain::value_objects::{PlayerId, RoomCode};

/// The seat a connection currently occupies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room: RoomCode,
    pub player: PlayerId,
}

/// A connected client
#[derive(Debug)]
pub struct ClientConnection {
    pub seat: Option<Seat>,
    /// Channel to send messages to this client
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Manages open connections and their seats
#[derive(Debug, Default)]
pub struct SessionManager {
    clients: HashMap<ClientId, ClientConnection>,
    /// Which connection currently speaks for a player
    players: HashMap<PlayerId, ClientId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client_id: ClientId, sender: mpsc::UnboundedSender<ServerMessage>) {
        self.clients.insert(
            client_id,
            ClientConnection { seat: None, sender },
        );
    }

    /// Forget a closed connection. Returns its seat only if this connection
    /// still spoke for that player.
    pub fn unregister(&mut self, client_id: ClientId) -> Option<Seat> {
        let connection = self.clients.remove(&client_id)?;
        let seat = connection.seat?;
        if self.players.get(&seat.player) == Some(&client_id) {
            self.players.remove(&seat.player);
            Some(seat)
        } else {
            None
        }
    }

    pub fn seat(&self, client_id: ClientId) -> Option<&Seat> {
        self.clients.get(&client_id)?.seat.as_ref()
    }

    /// Bind a connection to a seat, taking it over from any older connection
    pub fn attach(&mut self, client_id: ClientId, room: RoomCode, player: PlayerId) {
        if let Some(previous) = self.players.insert(player, client_id) {
            if previous != client_id {
                if let Some(old) = self.clients.get_mut(&previous) {
                    old.seat = None;
                }
                tracing::info!("Client {} took over player {} from {}", client_id, player, previous);
            }
        }
        if let Some(connection) = self.clients.get_mut(&client_id) {
            if let Some(Seat { player: old_player, .. }) = connection.seat.take() {
                if old_player != player {
                    self.players.remove(&old_player);
                }
            }
            connection.seat = Some(Seat { room, player });
        }
    }

    pub fn detach(&mut self, player: PlayerId) {
        if let Some(client_id) = self.players.remove(&player) {
            if let Some(connection) = self.clients.get_mut(&client_id) {
                connection.seat = None;
            }
        }
    }

    pub fn apply_seat(&mut self, command: &SeatCommand) {
        match command {
            SeatCommand::Attach {
                client,
                room,
                player,
            } => self.attach(*client, room.clone(), *player),
            SeatCommand::Detach { player } => self.detach(*player),
        }
    }

    /// Send to one connection, bound or not
    pub fn send_to_client(&self, client_id: ClientId, message: &ServerMessage) {
        if let Some(connection) = self.clients.get(&client_id) {
            if let Err(e) = connection.sender.send(message.clone()) {
                tracing::warn!("Failed to send message to client {}: {}", client_id, e);
            }
        }
    }

    /// Send to whichever connection speaks for a player. Players without a
    /// live connection (bots, disconnected) are skipped.
    pub fn send_to_player(&self, player: PlayerId, message: &ServerMessage) {
        if let Some(client_id) = self.players.get(&player) {
            self.send_to_client(*client_id, message);
        }
    }

    pub fn deliver(&self, envelope: &Envelope) {
        for player in &envelope.recipients {
            self.send_to_player(*player, &envelope.message);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn seated_count(&self) -> usize {
        self.players.len()
    }
}
