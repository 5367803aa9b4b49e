//! WebSocket handler for player connections
//!
//! Each connection gets a channel the session manager writes to. Inbound
//! frames are parsed into [`ClientMessage`] intents and routed to the
//! tournament service. Rejections go back to the sender only.

use std::sync::{Arc, PoisonError};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::application::dto::{ClientId, ServerMessage};
use crate::domain::errors::GameError;
use crate::domain::value_objects::{PlayerId, ReconnectToken, RoomCode};
use crate::infrastructure::session::Seat;
use crate::infrastructure::state::AppState;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        nickname: String,
        #[serde(default)]
        no_bots: bool,
    },
    JoinRoom {
        room_id: String,
        nickname: String,
    },
    /// Reclaim a seat held since a dropped connection
    RejoinRoom {
        room_id: String,
        player_id: PlayerId,
        reconnect_token: ReconnectToken,
    },
    SelectCharacter {
        room_id: String,
        character_id: String,
    },
    /// Host only
    StartGame {
        room_id: String,
    },
    Spin {
        room_id: String,
    },
    EndTurn {
        room_id: String,
    },
    BuyUpgrade {
        room_id: String,
        stat: String,
    },
    LeaveRoom {
        room_id: String,
    },
    GetRooms,
    Heartbeat,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let client_id = ClientId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let open = {
        let mut sessions = state.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.register(client_id, tx.clone());
        sessions.client_count()
    };

    tracing::info!("New WebSocket connection established: {} ({} open)", client_id, open);

    // Forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("Failed to serialize outbound message: {}", e),
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => handle_message(msg, &state, client_id).await,
                    Err(e) => {
                        tracing::debug!("Failed to parse message from {}: {}", client_id, e);
                        Some(ServerMessage::error(
                            "PARSE_ERROR",
                            format!("Invalid message format: {}", e),
                        ))
                    }
                };
                if let Some(reply) = reply {
                    if tx.send(reply).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("WebSocket connection closed by client: {}", client_id);
                break;
            }
            Err(e) => {
                tracing::error!("WebSocket error for client {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up: release the seat and let the room decide what a disconnect means
    let (seat, seated) = {
        let mut sessions = state.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let seat = sessions.unregister(client_id);
        (seat, sessions.seated_count())
    };
    tracing::debug!("{} seated connections remain", seated);
    if let Some(Seat { room, player }) = seat {
        state.tournament.disconnect(&room, player).await;
    }

    send_task.abort();
    tracing::info!("WebSocket connection terminated: {}", client_id);
}

/// Route one intent. Returns a reply for the sender only: a direct answer
/// (`pong`, `roomsList`) or the error that rejected the intent.
async fn handle_message(
    msg: ClientMessage,
    state: &AppState,
    client_id: ClientId,
) -> Option<ServerMessage> {
    match route(msg, state, client_id).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!("Rejected intent from {}: {}", client_id, e);
            Some(ServerMessage::from(&e))
        }
    }
}

async fn route(
    msg: ClientMessage,
    state: &AppState,
    client_id: ClientId,
) -> Result<Option<ServerMessage>, GameError> {
    let tournament = &state.tournament;
    match msg {
        ClientMessage::Heartbeat => return Ok(Some(ServerMessage::Pong)),
        ClientMessage::GetRooms => {
            let rooms = tournament.list_rooms().await;
            return Ok(Some(ServerMessage::RoomsList { rooms }));
        }
        ClientMessage::CreateRoom { nickname, no_bots } => {
            vacate_seat(state, client_id).await;
            tournament.create_room(client_id, &nickname, no_bots).await;
        }
        ClientMessage::JoinRoom { room_id, nickname } => {
            let code = RoomCode::parse(&room_id);
            if seat_of(state, client_id).is_some_and(|seat| seat.room == code) {
                return Err(GameError::AlreadyJoined);
            }
            vacate_seat(state, client_id).await;
            tournament.join_room(client_id, &code, &nickname).await?;
        }
        ClientMessage::RejoinRoom {
            room_id,
            player_id,
            reconnect_token,
        } => {
            let code = RoomCode::parse(&room_id);
            if seat_of(state, client_id).is_some_and(|seat| seat.player != player_id) {
                vacate_seat(state, client_id).await;
            }
            tournament
                .rejoin_room(client_id, &code, player_id, reconnect_token)
                .await?;
        }
        ClientMessage::SelectCharacter {
            room_id,
            character_id,
        } => {
            let (code, player) = seated(state, client_id, &room_id)?;
            tournament
                .select_character(&code, player, &character_id)
                .await?;
        }
        ClientMessage::StartGame { room_id } => {
            let (code, player) = seated(state, client_id, &room_id)?;
            tournament.start_game(&code, player).await?;
        }
        ClientMessage::Spin { room_id } => {
            let (code, player) = seated(state, client_id, &room_id)?;
            tournament.spin(&code, player).await?;
        }
        ClientMessage::EndTurn { room_id } => {
            let (code, player) = seated(state, client_id, &room_id)?;
            tournament.end_turn(&code, player).await?;
        }
        ClientMessage::BuyUpgrade { room_id, stat } => {
            let (code, player) = seated(state, client_id, &room_id)?;
            tournament.buy_upgrade(&code, player, &stat).await?;
        }
        ClientMessage::LeaveRoom { room_id } => {
            let (code, player) = seated(state, client_id, &room_id)?;
            tournament.leave_room(&code, player).await?;
        }
    }
    Ok(None)
}

fn seat_of(state: &AppState, client_id: ClientId) -> Option<Seat> {
    state
        .sessions
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .seat(client_id)
        .cloned()
}

/// The player this connection speaks for in `room_id`
fn seated(state: &AppState, client_id: ClientId, room_id: &str) -> Result<(RoomCode, PlayerId), GameError> {
    let code = RoomCode::parse(room_id);
    match seat_of(state, client_id) {
        Some(seat) if seat.room == code => Ok((seat.room, seat.player)),
        _ => Err(GameError::NotInRoom),
    }
}

/// Leave whatever room this connection sits in before taking another seat
async fn vacate_seat(state: &AppState, client_id: ClientId) {
    if let Some(Seat { room, player }) = seat_of(state, client_id) {
        if let Err(e) = state.tournament.leave_room(&room, player).await {
            tracing::debug!("Client {} could not leave room {}: {}", client_id, room, e);
        }
    }
}
