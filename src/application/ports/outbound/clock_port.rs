//! Clock port - Interface for reading wall-clock time
//!
//! Every timing window (pre-battle delay, recharge, reconnect grace) is
//! measured against this clock so tests can drive time explicitly.

use chrono::{DateTime, Utc};

pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
