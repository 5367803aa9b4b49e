use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    application::dto::{RoomSnapshot, RoomSummary},
    domain::value_objects::RoomCode,
    infrastructure::state::AppState,
};

/// List open rooms, oldest first. Same data as the `getRooms` intent.
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    Json(state.tournament.list_rooms().await)
}

/// Full snapshot of one room
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoomSnapshot>, (StatusCode, String)> {
    state
        .tournament
        .snapshot(&RoomCode::parse(&id))
        .await
        .map(Json)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
}
