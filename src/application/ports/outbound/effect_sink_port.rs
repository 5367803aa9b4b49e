//! Effect sink port - Interface for delivering orchestrator output
//!
//! The orchestrator applies each batch of effects while it still holds the
//! room, so every client sees one room's messages in the order they were
//! produced.

use crate::application::dto::Effects;

pub trait EffectSink: Send + Sync {
    /// Must not block or await; called with a room locked
    fn apply(&self, effects: &Effects);
}
