//! Market-data feed v3 wire messages.
//!
//! Hand-derived `prost` messages for the subset of the upstream schema the
//! pipeline reads. Unknown fields are skipped by the decoder, so frames that
//! carry more than this (market info, OHLC intervals we ignore) still decode.

use prost::Message;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::FeedResult;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ltpc {
    #[prost(double, tag = "1")]
    pub ltp: f64,
    #[prost(int64, tag = "2")]
    pub ltt: i64,
    #[prost(int64, tag = "3")]
    pub ltq: i64,
    #[prost(double, tag = "4")]
    pub cp: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Quote {
    #[prost(int64, tag = "1")]
    pub bid_q: i64,
    #[prost(double, tag = "2")]
    pub bid_p: f64,
    #[prost(int64, tag = "3")]
    pub ask_q: i64,
    #[prost(double, tag = "4")]
    pub ask_p: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MarketLevel {
    #[prost(message, repeated, tag = "1")]
    pub bid_ask_quote: Vec<Quote>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OptionGreeks {
    #[prost(double, tag = "1")]
    pub delta: f64,
    #[prost(double, tag = "2")]
    pub theta: f64,
    #[prost(double, tag = "3")]
    pub gamma: f64,
    #[prost(double, tag = "4")]
    pub vega: f64,
    #[prost(double, tag = "5")]
    pub rho: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ohlc {
    #[prost(string, tag = "1")]
    pub interval: String,
    #[prost(double, tag = "2")]
    pub open: f64,
    #[prost(double, tag = "3")]
    pub high: f64,
    #[prost(double, tag = "4")]
    pub low: f64,
    #[prost(double, tag = "5")]
    pub close: f64,
    #[prost(int64, tag = "6")]
    pub vol: i64,
    #[prost(int64, tag = "7")]
    pub ts: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MarketOhlc {
    #[prost(message, repeated, tag = "1")]
    pub ohlc: Vec<Ohlc>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MarketFullFeed {
    #[prost(message, optional, tag = "1")]
    pub ltpc: Option<Ltpc>,
    #[prost(message, optional, tag = "2")]
    pub market_level: Option<MarketLevel>,
    #[prost(message, optional, tag = "3")]
    pub option_greeks: Option<OptionGreeks>,
    #[prost(message, optional, tag = "4")]
    pub market_ohlc: Option<MarketOhlc>,
    #[prost(double, tag = "5")]
    pub atp: f64,
    #[prost(int64, tag = "6")]
    pub vtt: i64,
    #[prost(double, tag = "7")]
    pub oi: f64,
    #[prost(double, tag = "8")]
    pub iv: f64,
    #[prost(double, tag = "9")]
    pub tbq: f64,
    #[prost(double, tag = "10")]
    pub tsq: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndexFullFeed {
    #[prost(message, optional, tag = "1")]
    pub ltpc: Option<Ltpc>,
    #[prost(message, optional, tag = "2")]
    pub market_ohlc: Option<MarketOhlc>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FullFeed {
    #[prost(oneof = "full_feed::Body", tags = "1, 2")]
    pub body: Option<full_feed::Body>,
}

pub mod full_feed {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "1")]
        MarketFf(super::MarketFullFeed),
        #[prost(message, tag = "2")]
        IndexFf(super::IndexFullFeed),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FirstLevelWithGreeks {
    #[prost(message, optional, tag = "1")]
    pub ltpc: Option<Ltpc>,
    #[prost(message, optional, tag = "2")]
    pub first_depth: Option<Quote>,
    #[prost(message, optional, tag = "3")]
    pub option_greeks: Option<OptionGreeks>,
    #[prost(int64, tag = "4")]
    pub vtt: i64,
    #[prost(double, tag = "5")]
    pub oi: f64,
    #[prost(double, tag = "6")]
    pub iv: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RequestMode {
    Ltpc = 0,
    FullD5 = 1,
    OptionGreeks = 2,
    FullD30 = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Feed {
    #[prost(oneof = "feed::Body", tags = "1, 2, 3")]
    pub body: Option<feed::Body>,
    #[prost(enumeration = "RequestMode", tag = "4")]
    pub request_mode: i32,
}

pub mod feed {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Body {
        #[prost(message, tag = "1")]
        Ltpc(super::Ltpc),
        #[prost(message, tag = "2")]
        FullFeed(super::FullFeed),
        #[prost(message, tag = "3")]
        FirstLevelWithGreeks(super::FirstLevelWithGreeks),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FeedType {
    InitialFeed = 0,
    LiveFeed = 1,
    MarketInfo = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FeedResponse {
    #[prost(enumeration = "FeedType", tag = "1")]
    pub r#type: i32,
    #[prost(map = "string, message", tag = "2")]
    pub feeds: HashMap<String, Feed>,
    #[prost(int64, tag = "3")]
    pub current_ts: i64,
}

pub fn decode_frame(bytes: &[u8]) -> FeedResult<FeedResponse> {
    Ok(FeedResponse::decode(bytes)?)
}

impl Feed {
    /// JSON record for the tick store, if this entry carries a full
    /// market or index payload.
    pub fn market_payload(&self) -> Option<Value> {
        match &self.body {
            Some(feed::Body::FullFeed(FullFeed {
                body: Some(full_feed::Body::MarketFf(m)),
            })) => Some(json!({ "marketFF": market_json(m) })),
            Some(feed::Body::FullFeed(FullFeed {
                body: Some(full_feed::Body::IndexFf(i)),
            })) => Some(json!({ "indexFF": { "ltpc": i.ltpc.as_ref().map(ltpc_json) } })),
            _ => None,
        }
    }
}

fn ltpc_json(l: &Ltpc) -> Value {
    json!({ "ltp": l.ltp, "ltt": l.ltt, "ltq": l.ltq, "cp": l.cp })
}

fn market_json(m: &MarketFullFeed) -> Value {
    let quotes: Vec<Value> = m
        .market_level
        .as_ref()
        .map(|level| {
            level
                .bid_ask_quote
                .iter()
                .map(|q| json!({ "bidQ": q.bid_q, "bidP": q.bid_p, "askQ": q.ask_q, "askP": q.ask_p }))
                .collect()
        })
        .unwrap_or_default();

    let greeks = m
        .option_greeks
        .as_ref()
        .map(|g| json!({ "delta": g.delta, "theta": g.theta, "gamma": g.gamma, "vega": g.vega, "rho": g.rho }))
        .unwrap_or_else(|| json!({}));

    json!({
        "ltpc": m.ltpc.as_ref().map(ltpc_json),
        "marketLevel": { "bidAskQuote": quotes },
        "optionGreeks": greeks,
        "atp": m.atp,
        "vtt": m.vtt,
        "oi": m.oi,
        "iv": m.iv,
        "tbq": m.tbq,
        "tsq": m.tsq,
    })
}
