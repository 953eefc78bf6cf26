//! Application layer - orchestration of domain logic.
//!
//! This layer owns the runtime state and coordinates the domain rules:
//! - Rate limiter (send admission, reputation, schedule advice)
//! - Targeting optimizer (contact suppression and engagement)
//! - Configuration and decision metrics
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod config;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod stats;
pub mod targeting;
