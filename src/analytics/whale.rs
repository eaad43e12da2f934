use serde::{Deserialize, Serialize};

use crate::analytics::signal::{AlertType, Direction, WhaleSignal, WhaleType};
use crate::constants::whale::*;
use crate::data::window::ArrayBundle;

/// One large order-flow or depth event seen inside a window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhaleAlert {
    pub whale_type: WhaleType,
    pub alert_type: AlertType,
    /// OI diff, volume diff or resting quantity, depending on `alert_type`
    pub alert_value: f64,
    pub signal: WhaleSignal,
}

impl WhaleAlert {
    pub fn direction(&self) -> Direction {
        self.signal.direction()
    }
}

/// OI jumps/drops, volume spikes and order walls. Each check is independent,
/// so a single window can yield anything from zero to five alerts.
pub fn analyze_whale_activity(arrays: &ArrayBundle) -> Vec<WhaleAlert> {
    let mut alerts = Vec::new();

    let oi_diffs = diffs(&arrays.oi);
    if let (Some(&max_jump), Some(&min_drop)) = (oi_diffs.iter().max(), oi_diffs.iter().min()) {
        if max_jump >= SMALL_WHALE_THRESHOLD {
            alerts.push(WhaleAlert {
                whale_type: size_band(max_jump),
                alert_type: AlertType::OiJump,
                alert_value: max_jump as f64,
                signal: WhaleSignal::Bullish,
            });
        }
        if min_drop <= -SMALL_WHALE_THRESHOLD {
            alerts.push(WhaleAlert {
                whale_type: size_band(-min_drop),
                alert_type: AlertType::OiDrop,
                alert_value: min_drop as f64,
                signal: WhaleSignal::Bearish,
            });
        }
    }

    let volume_diffs = diffs(&arrays.volume);
    if let Some(&max_volume) = volume_diffs.iter().max() {
        let mean = volume_diffs.iter().sum::<i64>() as f64 / volume_diffs.len() as f64;
        if mean > 0.0 && max_volume as f64 > mean * VOLUME_SPIKE_MULTIPLIER && max_volume > VOLUME_SPIKE_MIN {
            alerts.push(WhaleAlert {
                whale_type: WhaleType::VolumeWhale,
                alert_type: AlertType::VolumeSpike,
                alert_value: max_volume as f64,
                signal: WhaleSignal::Neutral,
            });
        }
    }

    if let Some(&bid_wall) = arrays.bid_qtys.iter().max() {
        if bid_wall >= ORDER_WALL_THRESHOLD {
            alerts.push(WhaleAlert {
                whale_type: WhaleType::LimitWhale,
                alert_type: AlertType::BidWall,
                alert_value: bid_wall as f64,
                signal: WhaleSignal::BullishSupport,
            });
        }
    }

    if let Some(&ask_wall) = arrays.ask_qtys.iter().max() {
        if ask_wall >= ORDER_WALL_THRESHOLD {
            alerts.push(WhaleAlert {
                whale_type: WhaleType::LimitWhale,
                alert_type: AlertType::AskWall,
                alert_value: ask_wall as f64,
                signal: WhaleSignal::BearishResistance,
            });
        }
    }

    alerts
}

fn diffs(values: &[i64]) -> Vec<i64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn size_band(magnitude: i64) -> WhaleType {
    if magnitude >= MEGA_WHALE_THRESHOLD {
        WhaleType::MegaWhale
    } else if magnitude >= LARGE_WHALE_THRESHOLD {
        WhaleType::LargeWhale
    } else if magnitude >= MEDIUM_WHALE_THRESHOLD {
        WhaleType::MediumWhale
    } else {
        WhaleType::SmallWhale
    }
}
