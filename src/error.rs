//! Custom error types for the signal pipeline
//!
//! Provides structured, typed errors instead of generic Box<dyn Error>

use thiserror::Error;

/// Errors raised by the upstream market-data feed client
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Authorization failed: {reason}")]
    Authorization { reason: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Frame decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {secs}s while {during}")]
    Timeout { secs: u64, during: &'static str },

    #[error("Connection closed by upstream")]
    ConnectionClosed,

    #[error("Feed client is no longer running")]
    ChannelClosed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tick store, pub/sub and signal repository errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Startup configuration errors. These are the only fatal errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Per-instrument processing errors inside one orchestrator cycle
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No ticks for {instrument_key} in window")]
    EmptyWindow { instrument_key: String },
}

pub type FeedResult<T> = Result<T, FeedError>;
pub type StoreResult<T> = Result<T, StoreError>;
