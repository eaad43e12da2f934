//! Application-wide constants and magic numbers
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make the codebase easier to tune.

use std::time::Duration;

/// Upstream feed constants
pub mod feed {
    use super::*;

    /// Keep only the most recent ticks in hot storage
    pub const DATA_RETENTION: Duration = Duration::from_secs(120);

    /// Fixed delay between reconnect attempts
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

    /// Bound on REST authorization and socket handshake
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

    /// Drop the connection after this long without any frame from upstream
    pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

    /// How often the receive loop wakes up to check the stop flag
    pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub const AUTHORIZE_URL: &str = "https://api.upstox.com/v3/feed/market-data-feed/authorize";

    /// Always-on index instrument
    pub const INDEX_KEY: &str = "NSE_INDEX|Nifty 50";
    pub const INDEX_ALIAS: &str = "NIFTY_50";

    /// Subscription modes
    pub const INDEX_MODE: &str = "full";
    pub const OPTION_MODE: &str = "full_d30";

    /// Maximum market depth levels carried per tick
    pub const DEPTH_LEVELS: usize = 30;
}

/// Tick store keyspace
pub mod store {
    /// Every instrument stream lives under this prefix
    pub const STREAM_PREFIX: &str = "stream:";

    /// Pub/sub topic for finished signals
    pub const TRADE_SIGNALS_TOPIC: &str = "trade_signals";

    pub const DEFAULT_BUS_CAPACITY: usize = 1024;

    /// Minimum gap between sweeps for streams that stopped ticking
    pub const STALE_SWEEP_INTERVAL_MS: i64 = 10_000;

    /// In-memory signal history kept per instrument and result table
    pub const MEMORY_ROWS_PER_TABLE: usize = 100;
}

/// Option chain constants
pub mod instruments {
    pub const OPTION_CHAIN_URL: &str = "https://api.upstox.com/v2/option/chain";

    pub const DEFAULT_STRIKE_STEP: i64 = 50;
    pub const DEFAULT_STRIKES_EACH_SIDE: usize = 2;

    /// IST is UTC+05:30
    pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

    /// Weekly expiry rolls forward after the Thursday close (15:30 IST)
    pub const MARKET_CLOSE_HOUR: u32 = 15;
    pub const MARKET_CLOSE_MINUTE: u32 = 30;
}

/// Cycle orchestrator constants
pub mod signals {
    /// Analysis window length
    pub const WINDOW_SECS: i64 = 60;

    /// Rows per result type fed back into the sentiment aggregator
    pub const HISTORY_LIMIT: usize = 10;

    /// Never sleep less than this when aligning to the next minute
    pub const MIN_ALIGN_SLEEP_MS: i64 = 100;
}

/// Whale detector thresholds
pub mod whale {
    pub const MEGA_WHALE_THRESHOLD: i64 = 20_000;
    pub const LARGE_WHALE_THRESHOLD: i64 = 10_000;
    pub const MEDIUM_WHALE_THRESHOLD: i64 = 5_000;
    pub const SMALL_WHALE_THRESHOLD: i64 = 2_000;

    pub const VOLUME_SPIKE_MULTIPLIER: f64 = 10.0;
    pub const VOLUME_SPIKE_MIN: i64 = 1_000;

    pub const ORDER_WALL_THRESHOLD: i64 = 50_000;
}

/// Greeks momentum thresholds (per second) and score weights
pub mod greeks {
    pub const HIGH_DELTA_VELOCITY: f64 = 0.001;
    pub const HIGH_GAMMA_SPIKE: f64 = 0.0001;
    pub const HIGH_IV_VELOCITY: f64 = 0.0005;

    pub const DELTA_WEIGHT: f64 = 20.0;
    pub const GAMMA_WEIGHT: f64 = 15.0;
    pub const IV_WEIGHT: f64 = 10.0;

    pub const NEUTRAL_SCORE: f64 = 50.0;
}

/// Imbalance band
pub mod imbalance {
    pub const SIGNAL_THRESHOLD: f64 = 0.2;
}

/// Sentiment blending weights
pub mod sentiment {
    pub const PATTERN_LOOKBACK: usize = 5;
    pub const PATTERN_WEIGHT: f64 = 10.0;
    pub const PANIC_WEIGHT: f64 = 30.0;
    pub const IMBALANCE_WEIGHT: f64 = 50.0;
    pub const GREEKS_WEIGHT: f64 = 0.4;
    pub const WHALE_WEIGHT: f64 = 15.0;

    pub const MAX_INSIGHTS: usize = 5;

    /// Regime switches to high volatility above this IV velocity
    pub const IV_VELOCITY_VOLATILE: f64 = 0.0005;
}
