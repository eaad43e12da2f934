//! Whale Hunter - real-time options order-flow signal pipeline
//!
//! This library provides the feed client that streams ticks into a short
//! retention store, the window aggregator and metric analyzers, and the
//! minute-aligned orchestrator that publishes and persists their results.

pub mod analytics;
pub mod bus;
pub mod clock;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod events;
pub mod exchange;
pub mod services;

// Re-export commonly used types
pub use bus::{EventBus, SignalPublisher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use events::{Published, SignalEnvelope, SignalPayload};

#[cfg(test)]
mod events_tests;
