use serde::{Deserialize, Serialize};

use crate::analytics::round2;
use crate::analytics::signal::{Direction, MarketRegime, SentimentLabel, TradeSignal};
use crate::constants::sentiment::*;
use crate::data::repository::RecentSignals;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentComponents {
    pub pattern_score: f64,
    pub panic_score: f64,
    pub imbalance_score: f64,
    pub greeks_score: f64,
    pub whale_score: f64,
}

impl SentimentComponents {
    /// Unclamped blend
    pub fn total(&self) -> f64 {
        self.pattern_score + self.panic_score + self.imbalance_score + self.greeks_score + self.whale_score
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: f64,
    pub resistance: f64,
    pub current_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeSetup {
    pub signal: TradeSignal,
    pub entry_price: f64,
    pub target: f64,
    pub stop_loss: f64,
    pub rr_ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: SentimentLabel,
    /// Clamped to [-100, 100], two decimals
    pub sentiment_score: f64,
    pub components: SentimentComponents,
    pub support_resistance: SupportResistance,
    pub trade_setup: TradeSetup,
    pub market_regime: MarketRegime,
    pub key_insights: Vec<String>,
}

/// Blend recently persisted results into one score, levels, setup and regime.
///
/// `recent` rows are newest first.
pub fn analyze_market_sentiment(recent: &RecentSignals, ltp: f64) -> SentimentResult {
    let mut insights = Vec::new();
    let mut components = SentimentComponents::default();

    // Patterns
    let pattern_net: i64 = recent
        .patterns
        .iter()
        .take(PATTERN_LOOKBACK)
        .map(|p| p.value.signal.direction().sign() as i64)
        .sum();
    components.pattern_score = pattern_net as f64 * PATTERN_WEIGHT;
    if components.pattern_score > 20.0 {
        insights.push(format!("Recent patterns are Bullish ({})", components.pattern_score));
    } else if components.pattern_score < -20.0 {
        insights.push(format!("Recent patterns are Bearish ({})", components.pattern_score));
    }

    // Panic, latest only
    if let Some(panic) = recent.panics.first() {
        match panic.value.signal.direction() {
            Direction::Bullish => {
                components.panic_score = PANIC_WEIGHT;
                insights.push("⚠️ Recent Panic Buy detected!".to_string());
            }
            Direction::Bearish => {
                components.panic_score = -PANIC_WEIGHT;
                insights.push("⚠️ Recent Panic Sell detected!".to_string());
            }
            Direction::Neutral => {}
        }
    }

    // Imbalance
    if !recent.imbalances.is_empty() {
        let avg_ratio =
            recent.imbalances.iter().map(|r| r.value.ratio).sum::<f64>() / recent.imbalances.len() as f64;
        components.imbalance_score = avg_ratio * IMBALANCE_WEIGHT;
        if avg_ratio > 0.3 {
            insights.push("Order Book is Bid Heavy".to_string());
        } else if avg_ratio < -0.3 {
            insights.push("Order Book is Ask Heavy".to_string());
        }
    }

    // Greeks, latest only
    let latest_greeks = recent.greeks.first().map(|g| &g.value);
    if let Some(greeks) = latest_greeks {
        components.greeks_score = (greeks.momentum_score - 50.0) * GREEKS_WEIGHT;
        if greeks.momentum_score > 70.0 {
            insights.push("Greeks Momentum is Explosive".to_string());
        }
    }

    // Whales
    let bullish_whales = recent.whales.iter().filter(|w| w.value.direction() == Direction::Bullish).count();
    let bearish_whales = recent.whales.iter().filter(|w| w.value.direction() == Direction::Bearish).count();
    components.whale_score = (bullish_whales as f64 - bearish_whales as f64) * WHALE_WEIGHT;
    if bullish_whales > bearish_whales {
        insights.push(format!("Whales are Net Bullish ({} vs {})", bullish_whales, bearish_whales));
    } else if bearish_whales > bullish_whales {
        insights.push(format!("Whales are Net Bearish ({} vs {})", bearish_whales, bullish_whales));
    }

    // Sum first, clamp after.
    let score = components.total().clamp(-100.0, 100.0);
    let (support, resistance) = price_range(recent, ltp);
    let trade_setup = trade_setup(score, support, resistance, ltp);
    let support_resistance = SupportResistance {
        support: round2(support),
        resistance: round2(resistance),
        current_price: ltp,
    };

    let market_regime = if score.abs() > 50.0 {
        MarketRegime::OneSidedTrend
    } else if !recent.panics.is_empty()
        || latest_greeks.is_some_and(|g| g.iv_velocity > IV_VELOCITY_VOLATILE)
    {
        MarketRegime::HighVolatility
    } else {
        MarketRegime::Sideways
    };

    components.imbalance_score = round2(components.imbalance_score);
    components.greeks_score = round2(components.greeks_score);
    insights.truncate(MAX_INSIGHTS);

    SentimentResult {
        sentiment: sentiment_label(score),
        sentiment_score: round2(score),
        components,
        support_resistance,
        trade_setup,
        market_regime,
        key_insights: insights,
    }
}

pub fn sentiment_label(score: f64) -> SentimentLabel {
    if score >= 60.0 {
        SentimentLabel::ExtremeBullish
    } else if score >= 20.0 {
        SentimentLabel::Bullish
    } else if score <= -60.0 {
        SentimentLabel::ExtremeBearish
    } else if score <= -20.0 {
        SentimentLabel::Bearish
    } else {
        SentimentLabel::Neutral
    }
}

/// Unrounded `(support, resistance)` from recent prices, patterns first,
/// imbalance prices as fallback.
fn price_range(recent: &RecentSignals, ltp: f64) -> (f64, f64) {
    let mut prices: Vec<f64> = recent
        .patterns
        .iter()
        .map(|p| p.value.last_price)
        .filter(|p| *p > 0.0)
        .collect();
    if prices.is_empty() {
        prices = recent
            .imbalances
            .iter()
            .map(|i| i.value.last_price)
            .filter(|p| *p > 0.0)
            .collect();
    }

    let (mut support, mut resistance) = (ltp * 0.99, ltp * 1.01);
    if !prices.is_empty() {
        support = prices.iter().copied().fold(f64::INFINITY, f64::min);
        resistance = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if resistance - support < ltp * 0.001 {
            support = ltp * 0.995;
            resistance = ltp * 1.005;
        }
    }

    (support, resistance)
}

/// Levels come in unrounded; only the emitted prices are rounded.
fn trade_setup(score: f64, support: f64, resistance: f64, ltp: f64) -> TradeSetup {
    let mut setup = TradeSetup {
        signal: TradeSignal::Wait,
        entry_price: ltp,
        target: 0.0,
        stop_loss: 0.0,
        rr_ratio: 0.0,
    };

    let (signal, stop_loss, target) = if score > 20.0 {
        (TradeSignal::Buy, support - ltp * 0.001, resistance + ltp * 0.002)
    } else if score < -20.0 {
        (TradeSignal::Sell, resistance + ltp * 0.001, support - ltp * 0.002)
    } else {
        return setup;
    };
    let (risk, reward) = match signal {
        TradeSignal::Buy => (ltp - stop_loss, target - ltp),
        _ => (stop_loss - ltp, ltp - target),
    };

    setup.signal = signal;
    setup.stop_loss = round2(stop_loss);
    setup.target = round2(target);
    if risk > 0.0 {
        setup.rr_ratio = round2(reward / risk);
    }
    setup
}
