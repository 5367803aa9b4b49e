//! Timer scheduler - cancellable delayed callbacks keyed by `TimerKey`
//!
//! Each scheduled key is one tokio task sleeping until its deadline. When it
//! wakes it reports the key on the `fired` channel; the game driver routes it
//! back into the orchestrator. Scheduling a key that is already pending
//! replaces it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::dto::{TimerCommand, TimerKey};
use crate::domain::value_objects::RoomCode;

type PendingTimers = HashMap<TimerKey, (u64, JoinHandle<()>)>;

pub struct TimerScheduler {
    pending: Arc<Mutex<PendingTimers>>,
    next_generation: AtomicU64,
    fired: mpsc::UnboundedSender<TimerKey>,
}

impl TimerScheduler {
    pub fn new(fired: mpsc::UnboundedSender<TimerKey>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            fired,
        }
    }

    fn lock(pending: &Mutex<PendingTimers>) -> MutexGuard<'_, PendingTimers> {
        pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called from within a tokio runtime
    pub fn apply(&self, command: &TimerCommand) {
        match command {
            TimerCommand::Schedule { key, after } => self.schedule(key.clone(), *after),
            TimerCommand::Cancel(key) => self.cancel(key),
            TimerCommand::CancelRoom(room) => self.cancel_room(room),
        }
    }

    pub fn schedule(&self, key: TimerKey, after: Duration) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let fired = self.fired.clone();
        let task_key = key.clone();

        // Hold the map while spawning so an immediate wake-up finds its entry
        let mut registry = Self::lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let current = {
                let mut pending = Self::lock(&pending);
                let current = matches!(pending.get(&task_key), Some((g, _)) if *g == generation);
                if current {
                    pending.remove(&task_key);
                }
                current
            };
            if current && fired.send(task_key.clone()).is_err() {
                tracing::warn!("Timer {:?} fired after the driver stopped", task_key);
            }
        });

        if let Some((_, previous)) = registry.insert(key, (generation, handle)) {
            previous.abort();
        }
    }

    pub fn cancel(&self, key: &TimerKey) {
        if let Some((_, handle)) = Self::lock(&self.pending).remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_room(&self, room: &RoomCode) {
        let mut pending = Self::lock(&self.pending);
        pending.retain(|key, (_, handle)| {
            if key.room() == room {
                handle.abort();
                false
            } else {
                true
            }
        });
        tracing::debug!("Cancelled timers for room {}", room);
    }

    pub fn pending_count(&self) -> usize {
        Self::lock(&self.pending).len()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        for (_, (_, handle)) in Self::lock(&self.pending).drain() {
            handle.abort();
        }
    }
}
