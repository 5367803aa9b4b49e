//! HTTP REST API routes

mod room_routes;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::infrastructure::state::AppState;

/// Create all API routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/rooms", get(room_routes::list_rooms))
        .route("/api/rooms/{id}", get(room_routes::get_room))
}

async fn health_check() -> &'static str {
    "OK"
}
