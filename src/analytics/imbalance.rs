use serde::{Deserialize, Serialize};

use crate::analytics::signal::ImbalanceSignal;
use crate::constants::imbalance::SIGNAL_THRESHOLD;
use crate::data::window::ArrayBundle;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceResult {
    pub signal: ImbalanceSignal,
    /// (TBQ - TSQ) / (TBQ + TSQ), always within [-1, 1]
    pub ratio: f64,
    pub tbq: i64,
    pub tsq: i64,
    pub last_price: f64,
}

/// Total buy vs total sell quantity on the latest tick.
pub fn analyze_order_book_imbalance(arrays: &ArrayBundle) -> ImbalanceResult {
    let (Some(&tbq), Some(&tsq)) = (arrays.tbq.last(), arrays.tsq.last()) else {
        return ImbalanceResult {
            signal: ImbalanceSignal::InsufficientData,
            ratio: 0.0,
            tbq: 0,
            tsq: 0,
            last_price: 0.0,
        };
    };
    let last_price = arrays.last_ltp().unwrap_or(0.0);

    imbalance_from_quantities(tbq, tsq, last_price)
}

pub fn imbalance_from_quantities(tbq: i64, tsq: i64, last_price: f64) -> ImbalanceResult {
    let total = tbq + tsq;
    if total == 0 {
        return ImbalanceResult {
            signal: ImbalanceSignal::Neutral,
            ratio: 0.0,
            tbq: 0,
            tsq: 0,
            last_price,
        };
    }

    let ratio = (tbq - tsq) as f64 / total as f64;
    let signal = if ratio > SIGNAL_THRESHOLD {
        ImbalanceSignal::BidHeavy
    } else if ratio < -SIGNAL_THRESHOLD {
        ImbalanceSignal::AskHeavy
    } else {
        ImbalanceSignal::Neutral
    };

    ImbalanceResult {
        signal,
        ratio,
        tbq,
        tsq,
        last_price,
    }
}
