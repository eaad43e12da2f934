//! Typed view of one raw feed record.
//!
//! Records arrive as the JSON form of the upstream full feed. Fields are read
//! from the nested market payload first and from the top level as a fallback;
//! anything missing or malformed becomes zero.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::feed::DEPTH_LEVELS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
    pub iv: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub bid_price: f64,
    pub bid_qty: i64,
    pub ask_price: f64,
    pub ask_qty: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub last_trade_time: i64,
    pub last_price: f64,
    pub prev_close: f64,
    pub open_interest: i64,
    pub cumulative_volume: i64,
    pub average_trade_price: f64,
    pub total_buy_qty: i64,
    pub total_sell_qty: i64,
    pub greeks: Greeks,
    pub depth: Vec<DepthLevel>,
}

impl Tick {
    pub fn from_record(record: &Value) -> Self {
        let market = record.get("marketFF");
        let index = record.get("indexFF");

        let ltpc = market
            .and_then(|m| m.get("ltpc"))
            .or_else(|| index.and_then(|i| i.get("ltpc")))
            .or_else(|| record.get("ltpc"));
        let ltpc_field = |name: &str| ltpc.and_then(|l| l.get(name));
        let market_field = |name: &str| market.and_then(|m| m.get(name));

        let option_greeks = market_field("optionGreeks")
            .filter(|g| is_non_empty_object(g))
            .or_else(|| record.get("optionGreeks"));
        let greek = |name: &str| lenient_f64(option_greeks.and_then(|g| g.get(name)));

        let cumulative_volume = first_nonzero_i64(&[
            market_field("vtt"),
            record.get("vtt"),
            ltpc_field("volume"),
        ]);
        let open_interest = first_nonzero_i64(&[market_field("oi"), record.get("oi")]);
        let iv = first_nonzero_f64(&[
            market_field("iv"),
            record.get("iv"),
            option_greeks.and_then(|g| g.get("iv")),
        ]);

        let quotes = market_field("marketLevel")
            .and_then(|l| l.get("bidAskQuote"))
            .filter(|q| q.as_array().map(|a| !a.is_empty()).unwrap_or(false))
            .or_else(|| record.get("marketLevel").and_then(|l| l.get("bidAskQuote")));
        let depth = quotes
            .and_then(Value::as_array)
            .map(|levels| {
                levels
                    .iter()
                    .take(DEPTH_LEVELS)
                    .map(|level| DepthLevel {
                        bid_price: lenient_f64(level.get("bidP")),
                        bid_qty: lenient_i64(level.get("bidQ")),
                        ask_price: lenient_f64(level.get("askP")),
                        ask_qty: lenient_i64(level.get("askQ")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Tick {
            last_trade_time: lenient_i64(ltpc_field("ltt")),
            last_price: lenient_f64(ltpc_field("ltp")),
            prev_close: lenient_f64(ltpc_field("cp")),
            open_interest,
            cumulative_volume,
            average_trade_price: first_nonzero_f64(&[market_field("atp"), record.get("atp")]),
            total_buy_qty: first_nonzero_i64(&[market_field("tbq"), record.get("tbq")]),
            total_sell_qty: first_nonzero_i64(&[market_field("tsq"), record.get("tsq")]),
            greeks: Greeks {
                delta: greek("delta"),
                gamma: greek("gamma"),
                theta: greek("theta"),
                vega: greek("vega"),
                rho: greek("rho"),
                iv,
            },
            depth,
        }
    }
}

fn is_non_empty_object(v: &Value) -> bool {
    v.as_object().map(|o| !o.is_empty()).unwrap_or(false)
}

/// Numbers or numeric strings (protobuf JSON writes int64 as strings).
pub(crate) fn lenient_f64(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub(crate) fn lenient_i64(v: Option<&Value>) -> i64 {
    match v {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn first_nonzero_i64(candidates: &[Option<&Value>]) -> i64 {
    candidates
        .iter()
        .map(|c| lenient_i64(*c))
        .find(|v| *v != 0)
        .unwrap_or(0)
}

fn first_nonzero_f64(candidates: &[Option<&Value>]) -> f64 {
    candidates
        .iter()
        .map(|c| lenient_f64(*c))
        .find(|v| *v != 0.0)
        .unwrap_or(0.0)
}
