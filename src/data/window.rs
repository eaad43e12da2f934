//! Window aggregation: raw tick range -> columnar arrays.

use ndarray::Array2;
use std::sync::Arc;
use tracing::debug;

use crate::constants::feed::DEPTH_LEVELS;
use crate::constants::store::STREAM_PREFIX;
use crate::data::store::TickStore;
use crate::data::tick::Tick;
use crate::error::StoreResult;

/// One equal-length column per scalar tick field, in arrival order, plus
/// `N x 30` depth matrices (zero-padded past the levels a tick carried).
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayBundle {
    pub ltp: Vec<f64>,
    pub ltt: Vec<i64>,
    pub cp: Vec<f64>,
    pub oi: Vec<i64>,
    pub volume: Vec<i64>,
    pub atp: Vec<f64>,
    pub tbq: Vec<i64>,
    pub tsq: Vec<i64>,
    pub delta: Vec<f64>,
    pub gamma: Vec<f64>,
    pub theta: Vec<f64>,
    pub vega: Vec<f64>,
    pub rho: Vec<f64>,
    pub iv: Vec<f64>,
    pub bid_prices: Array2<f64>,
    pub bid_qtys: Array2<i64>,
    pub ask_prices: Array2<f64>,
    pub ask_qtys: Array2<i64>,
}

impl ArrayBundle {
    pub fn empty() -> Self {
        Self::from_ticks(&[])
    }

    pub fn from_ticks(ticks: &[Tick]) -> Self {
        let n = ticks.len();
        let mut bid_prices = Array2::<f64>::zeros((n, DEPTH_LEVELS));
        let mut bid_qtys = Array2::<i64>::zeros((n, DEPTH_LEVELS));
        let mut ask_prices = Array2::<f64>::zeros((n, DEPTH_LEVELS));
        let mut ask_qtys = Array2::<i64>::zeros((n, DEPTH_LEVELS));

        for (i, tick) in ticks.iter().enumerate() {
            for (j, level) in tick.depth.iter().take(DEPTH_LEVELS).enumerate() {
                bid_prices[[i, j]] = level.bid_price;
                bid_qtys[[i, j]] = level.bid_qty;
                ask_prices[[i, j]] = level.ask_price;
                ask_qtys[[i, j]] = level.ask_qty;
            }
        }

        Self {
            ltp: ticks.iter().map(|t| t.last_price).collect(),
            ltt: ticks.iter().map(|t| t.last_trade_time).collect(),
            cp: ticks.iter().map(|t| t.prev_close).collect(),
            oi: ticks.iter().map(|t| t.open_interest).collect(),
            volume: ticks.iter().map(|t| t.cumulative_volume).collect(),
            atp: ticks.iter().map(|t| t.average_trade_price).collect(),
            tbq: ticks.iter().map(|t| t.total_buy_qty).collect(),
            tsq: ticks.iter().map(|t| t.total_sell_qty).collect(),
            delta: ticks.iter().map(|t| t.greeks.delta).collect(),
            gamma: ticks.iter().map(|t| t.greeks.gamma).collect(),
            theta: ticks.iter().map(|t| t.greeks.theta).collect(),
            vega: ticks.iter().map(|t| t.greeks.vega).collect(),
            rho: ticks.iter().map(|t| t.greeks.rho).collect(),
            iv: ticks.iter().map(|t| t.greeks.iv).collect(),
            bid_prices,
            bid_qtys,
            ask_prices,
            ask_qtys,
        }
    }

    pub fn len(&self) -> usize {
        self.ltp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ltp.is_empty()
    }

    pub fn last_ltp(&self) -> Option<f64> {
        self.ltp.last().copied()
    }
}

impl Default for ArrayBundle {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn to_arrays(ticks: &[Tick]) -> ArrayBundle {
    ArrayBundle::from_ticks(ticks)
}

pub fn stream_key(instrument_key: &str) -> String {
    format!("{}{}", STREAM_PREFIX, instrument_key)
}

/// Pulls a window of ticks for one instrument out of the tick store.
#[derive(Clone)]
pub struct WindowAggregator {
    store: Arc<dyn TickStore>,
}

impl WindowAggregator {
    pub fn new(store: Arc<dyn TickStore>) -> Self {
        Self { store }
    }

    /// Ticks in `[from_ms, to_ms)` in arrival order.
    pub async fn fetch_range(&self, instrument_key: &str, from_ms: i64, to_ms: i64) -> StoreResult<Vec<Tick>> {
        let entries = self
            .store
            .range(&stream_key(instrument_key), from_ms, to_ms)
            .await?;
        debug!("[WINDOW] {} -> {} records", instrument_key, entries.len());
        Ok(entries.iter().map(|e| Tick::from_record(&e.fields)).collect())
    }
}
