//! Game driver - applies orchestrator effects to the outside world
//!
//! Seat bindings and messages go to the session manager, timer commands to
//! the scheduler. Fired timers come back on a channel and are fed into the
//! orchestrator by [`run_timer_loop`].

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::application::dto::{Effects, SeatCommand, TimerKey};
use crate::application::ports::outbound::EffectSink;
use crate::application::services::TournamentService;
use crate::infrastructure::session::SessionManager;
use crate::infrastructure::timers::TimerScheduler;

pub struct GameDriver {
    sessions: Arc<RwLock<SessionManager>>,
    timers: TimerScheduler,
}

impl GameDriver {
    pub fn new(sessions: Arc<RwLock<SessionManager>>, fired: mpsc::UnboundedSender<TimerKey>) -> Self {
        Self {
            sessions,
            timers: TimerScheduler::new(fired),
        }
    }
}

impl EffectSink for GameDriver {
    fn apply(&self, effects: &Effects) {
        {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            for seat in &effects.seats {
                if matches!(seat, SeatCommand::Attach { .. }) {
                    sessions.apply_seat(seat);
                }
            }
            for envelope in &effects.messages {
                sessions.deliver(envelope);
            }
            for seat in &effects.seats {
                if matches!(seat, SeatCommand::Detach { .. }) {
                    sessions.apply_seat(seat);
                }
            }
        }
        if effects.timers.is_empty() {
            return;
        }
        for command in &effects.timers {
            self.timers.apply(command);
        }
        tracing::trace!("{} timers pending", self.timers.pending_count());
    }
}

/// Feed fired timers back into the orchestrator until the channel closes
pub async fn run_timer_loop(
    service: Arc<TournamentService>,
    mut fired: mpsc::UnboundedReceiver<TimerKey>,
) {
    tracing::info!("Starting timer loop");
    while let Some(key) = fired.recv().await {
        tracing::debug!("Timer fired: {:?}", key);
        service.on_timer(key).await;
    }
    tracing::info!("Timer loop stopped");
}
