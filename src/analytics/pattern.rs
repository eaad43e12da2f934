use serde::{Deserialize, Serialize};

use crate::analytics::signal::{Pattern, PatternSignal};
use crate::analytics::{first_last_change_f64, first_last_change_i64};
use crate::data::window::ArrayBundle;

/// Classification thresholds for the order-flow pattern detector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    pub oi_threshold: i64,
    pub volume_threshold: i64,
    pub min_oi_drop: i64,
    pub min_price_jump_pct: f64,
    pub min_volume_multiplier: f64,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            oi_threshold: 500,
            volume_threshold: 1000,
            min_oi_drop: -5000,
            min_price_jump_pct: 1.0,
            min_volume_multiplier: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub pattern: Pattern,
    pub signal: PatternSignal,
    pub is_panic: bool,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub oi_change: i64,
    pub volume_change: i64,
    pub delta_change: f64,
    pub last_price: f64,
}

impl PatternResult {
    pub fn insufficient_data() -> Self {
        Self {
            pattern: Pattern::InsufficientData,
            signal: PatternSignal::Neutral,
            is_panic: false,
            price_change: 0.0,
            price_change_pct: 0.0,
            oi_change: 0,
            volume_change: 0,
            delta_change: 0.0,
            last_price: 0.0,
        }
    }
}

/// OI / volume / price pattern detection, panic first.
pub fn analyze_oi_pattern(arrays: &ArrayBundle, thresholds: &PatternThresholds) -> PatternResult {
    if arrays.ltp.len() < 2 {
        return PatternResult::insufficient_data();
    }

    let ltp_start = arrays.ltp[0];
    let ltp_end = arrays.ltp[arrays.ltp.len() - 1];
    let price_change = ltp_end - ltp_start;
    let price_change_pct = if ltp_start > 0.0 {
        price_change / ltp_start * 100.0
    } else {
        0.0
    };

    let oi_change = first_last_change_i64(&arrays.oi);
    let volume_change = first_last_change_i64(&arrays.volume);
    let delta_change = first_last_change_f64(&arrays.delta);

    let panic_volume = thresholds.volume_threshold as f64 * thresholds.min_volume_multiplier;

    let (pattern, signal, is_panic) = if oi_change < thresholds.min_oi_drop
        && price_change_pct > thresholds.min_price_jump_pct
        && (volume_change as f64) > panic_volume
    {
        (Pattern::PanicShortCovering, PatternSignal::PanicBuy, true)
    } else if volume_change < thresholds.volume_threshold {
        (Pattern::LowVolume, PatternSignal::Skip, false)
    } else if oi_change.abs() <= thresholds.oi_threshold {
        (Pattern::Neutral, PatternSignal::Churn, false)
    } else {
        let oi_up = oi_change > thresholds.oi_threshold;
        let oi_down = oi_change < -thresholds.oi_threshold;
        match (price_change > 0.0, price_change < 0.0) {
            (true, _) if oi_up => (Pattern::LongBuildup, PatternSignal::Bullish, false),
            (true, _) if oi_down => (Pattern::ShortCovering, PatternSignal::VeryBullish, false),
            (_, true) if oi_up => (Pattern::ShortBuildup, PatternSignal::Bearish, false),
            (_, true) if oi_down => (Pattern::LongUnwinding, PatternSignal::Bearish, false),
            // Flat price: stays Neutral / Churn.
            _ => (Pattern::Neutral, PatternSignal::Churn, false),
        }
    };

    PatternResult {
        pattern,
        signal,
        is_panic,
        price_change,
        price_change_pct,
        oi_change,
        volume_change,
        delta_change,
        last_price: ltp_end,
    }
}
