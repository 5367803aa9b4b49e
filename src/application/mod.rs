//! Application layer - Use cases that drive the domain
//!
//! This layer contains:
//! - Services: the tournament orchestrator and room registry
//! - Ports: interfaces the application needs from infrastructure
//! - DTOs: outbound messages, views and side effects

pub mod dto;
pub mod ports;
pub mod services;
