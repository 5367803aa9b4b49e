//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - WebSocket: real-time communication with player clients
//! - Session: connection tracking and message fan-out
//! - Timers and Driver: scheduling and applying orchestrator effects
//! - HTTP: health check and room listing
//! - Config: Application configuration
//! - State: Shared application state

pub mod clock;
pub mod config;
pub mod driver;
pub mod http;
pub mod session;
pub mod state;
pub mod timers;
pub mod websocket;
