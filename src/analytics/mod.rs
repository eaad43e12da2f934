//! Metric analyzers.
//!
//! Pure functions over a window's [`ArrayBundle`](crate::data::window::ArrayBundle)
//! (or, for sentiment, over recently persisted results). None of them keep
//! state between calls or mutate their inputs.

pub mod greeks;
pub mod imbalance;
pub mod pattern;
pub mod sentiment;
pub mod signal;
pub mod whale;

pub use greeks::{analyze_greeks_momentum, GreeksMomentumResult};
pub use imbalance::{analyze_order_book_imbalance, ImbalanceResult};
pub use pattern::{analyze_oi_pattern, PatternResult, PatternThresholds};
pub use sentiment::{analyze_market_sentiment, SentimentResult};
pub use signal::Direction;
pub use whale::{analyze_whale_activity, WhaleAlert};

/// `last - first`, or 0 for fewer than two points
pub(crate) fn first_last_change_i64(values: &[i64]) -> i64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 => last - first,
        _ => 0,
    }
}

pub(crate) fn first_last_change_f64(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 => last - first,
        _ => 0.0,
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
