//! Slot Arena Engine - Authoritative server for slot-machine duel tournaments
//!
//! The Engine is the backend server that:
//! - Hosts tournament rooms and their brackets
//! - Resolves every spin, duel and round on the server
//! - Serves player clients via WebSocket

mod application;
mod domain;
mod infrastructure;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::driver::run_timer_loop;
use crate::infrastructure::http;
use crate::infrastructure::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slot_arena_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Slot Arena Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Max players per room: {}", config.max_players_per_room);
    tracing::info!("  Break: {}s, pre-battle: {}ms", config.break_duration_secs, config.pre_battle_delay_ms);
    tracing::info!("  Reconnect grace: {}s, bot tick: {}ms", config.reconnect_grace_secs, config.bot_tick_ms);
    if let Some(seed) = config.rng_seed {
        tracing::info!("  RNG seed: {}", seed);
    }
    let port = config.server_port;

    // Initialize application state
    let (state, fired) = AppState::new(config);
    let state = Arc::new(state);
    tracing::info!("Application state initialized");

    let timer_worker = tokio::spawn(run_timer_loop(state.tournament.clone(), fired));

    // Build the router
    let app = Router::new()
        .route("/ws", get(infrastructure::websocket::ws_handler))
        .merge(http::create_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping timers...");
            timer_worker.abort();
        }
    }

    Ok(())
}
