//! Shared application state

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::application::dto::TimerKey;
use crate::application::services::TournamentService;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::driver::GameDriver;
use crate::infrastructure::session::SessionManager;

/// Shared application state
pub struct AppState {
    /// Open WebSocket connections and their seats
    pub sessions: Arc<RwLock<SessionManager>>,
    pub tournament: Arc<TournamentService>,
}

impl AppState {
    /// Wire the orchestrator to the gateway. The returned receiver carries
    /// fired timers and must be handed to the timer loop.
    pub fn new(config: AppConfig) -> (Self, mpsc::UnboundedReceiver<TimerKey>) {
        let sessions = Arc::new(RwLock::new(SessionManager::new()));
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let driver = Arc::new(GameDriver::new(sessions.clone(), fired_tx));
        let tournament = Arc::new(TournamentService::new(
            config.tournament(),
            Arc::new(SystemClock),
            driver,
        ));

        let state = Self {
            sessions,
            tournament,
        };
        (state, fired_rx)
    }
}
