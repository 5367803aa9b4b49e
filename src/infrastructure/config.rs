//! Application configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::services::TournamentConfig;

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// WebSocket server port
    pub server_port: u16,
    /// Hard cap on players per room; 0 disables the cap
    pub max_players_per_room: usize,
    pub break_duration_secs: u64,
    pub pre_battle_delay_ms: u64,
    pub reconnect_grace_secs: u64,
    pub bot_tick_ms: u64,
    /// Fixed seed for reproducible rooms
    pub rng_seed: Option<u64>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)
                .context("SERVER_PORT must be a valid port number")?,
            max_players_per_room: parse_or(&lookup, "MAX_PLAYERS_PER_ROOM", 8)
                .context("MAX_PLAYERS_PER_ROOM must be a non-negative integer")?,
            break_duration_secs: parse_or(&lookup, "BREAK_DURATION_SECS", 20)
                .context("BREAK_DURATION_SECS must be a number of seconds")?,
            pre_battle_delay_ms: parse_or(&lookup, "PRE_BATTLE_DELAY_MS", 10_000)
                .context("PRE_BATTLE_DELAY_MS must be a number of milliseconds")?,
            reconnect_grace_secs: parse_or(&lookup, "RECONNECT_GRACE_SECS", 10)
                .context("RECONNECT_GRACE_SECS must be a number of seconds")?,
            bot_tick_ms: parse_or(&lookup, "BOT_TICK_MS", 1_500)
                .context("BOT_TICK_MS must be a number of milliseconds")?,
            rng_seed: lookup("RNG_SEED")
                .map(|raw| raw.trim().parse())
                .transpose()
                .context("RNG_SEED must be an unsigned integer")?,
        })
    }

    /// The subset the orchestrator needs
    pub fn tournament(&self) -> TournamentConfig {
        TournamentConfig {
            max_players: (self.max_players_per_room > 0).then_some(self.max_players_per_room),
            break_duration: Duration::from_secs(self.break_duration_secs),
            pre_battle_delay: Duration::from_millis(self.pre_battle_delay_ms),
            reconnect_grace: Duration::from_secs(self.reconnect_grace_secs),
            bot_tick: Duration::from_millis(self.bot_tick_ms),
            rng_seed: self.rng_seed,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => Ok(raw.trim().parse()?),
        None => Ok(default),
    }
}
