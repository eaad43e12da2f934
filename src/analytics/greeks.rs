use serde::{Deserialize, Serialize};

use crate::analytics::first_last_change_f64;
use crate::analytics::signal::{MomentumSignal, MomentumType};
use crate::constants::greeks::*;
use crate::data::window::ArrayBundle;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GreeksMomentumResult {
    pub delta_velocity: f64,
    pub gamma_acceleration: f64,
    pub iv_velocity: f64,
    pub theta_acceleration: f64,
    /// 0..=100, 50 is neutral
    pub momentum_score: f64,
    pub momentum_type: MomentumType,
    pub signal: MomentumSignal,
}

impl Default for GreeksMomentumResult {
    fn default() -> Self {
        Self {
            delta_velocity: 0.0,
            gamma_acceleration: 0.0,
            iv_velocity: 0.0,
            theta_acceleration: 0.0,
            momentum_score: NEUTRAL_SCORE,
            momentum_type: MomentumType::Neutral,
            signal: MomentumSignal::Wait,
        }
    }
}

/// Velocity / acceleration of the Greeks over a window of `duration_secs`.
pub fn analyze_greeks_momentum(arrays: &ArrayBundle, duration_secs: f64) -> GreeksMomentumResult {
    if arrays.delta.len() < 2 || duration_secs <= 0.0 {
        return GreeksMomentumResult::default();
    }

    let delta_velocity = first_last_change_f64(&arrays.delta) / duration_secs;
    let gamma_acceleration = first_last_change_f64(&arrays.gamma) / duration_secs;
    let iv_velocity = first_last_change_f64(&arrays.iv) / duration_secs;
    let theta_acceleration = first_last_change_f64(&arrays.theta) / duration_secs;

    let score = (NEUTRAL_SCORE
        + contribution(delta_velocity, HIGH_DELTA_VELOCITY, DELTA_WEIGHT)
        + contribution(gamma_acceleration, HIGH_GAMMA_SPIKE, GAMMA_WEIGHT)
        + contribution(iv_velocity, HIGH_IV_VELOCITY, IV_WEIGHT))
    .clamp(0.0, 100.0);

    let (momentum_type, signal) = classify_momentum(score);

    GreeksMomentumResult {
        delta_velocity,
        gamma_acceleration,
        iv_velocity,
        theta_acceleration,
        momentum_score: score,
        momentum_type,
        signal,
    }
}

/// Full signed weight at or above the threshold, linear below it.
fn contribution(rate: f64, threshold: f64, weight: f64) -> f64 {
    if rate.abs() >= threshold {
        weight * rate.signum()
    } else {
        rate / threshold * weight
    }
}

pub fn classify_momentum(score: f64) -> (MomentumType, MomentumSignal) {
    if score >= 80.0 {
        (MomentumType::ExplosiveBullish, MomentumSignal::StrongBuy)
    } else if score >= 65.0 {
        (MomentumType::StrongBullish, MomentumSignal::Buy)
    } else if score >= 55.0 {
        (MomentumType::ModerateBullish, MomentumSignal::BuyWait)
    } else if score <= 20.0 {
        (MomentumType::ExplosiveBearish, MomentumSignal::StrongSell)
    } else if score <= 35.0 {
        (MomentumType::StrongBearish, MomentumSignal::Sell)
    } else if score <= 45.0 {
        (MomentumType::ModerateBearish, MomentumSignal::SellWait)
    } else {
        (MomentumType::Neutral, MomentumSignal::Wait)
    }
}
