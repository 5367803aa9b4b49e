//! Application services - Use case implementations
//!
//! The tournament service is the single entry point for client intents and
//! timer firings. It drives the room aggregate and reports what to send and
//! what to schedule.

pub mod tournament_service;

pub use tournament_service::{TournamentConfig, TournamentService};
