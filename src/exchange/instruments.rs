//! Option-chain lookup and strike selection around the money.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc, Weekday};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::config::{FeedConfig, InstrumentsConfig};
use crate::constants::instruments::{IST_OFFSET_SECS, MARKET_CLOSE_HOUR, MARKET_CLOSE_MINUTE};
use crate::error::{FeedError, FeedResult};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OptionLeg {
    pub instrument_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChainEntry {
    pub strike_price: f64,
    #[serde(default)]
    pub call_options: Option<OptionLeg>,
    #[serde(default)]
    pub put_options: Option<OptionLeg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OptionChainResponse {
    #[serde(default)]
    pub data: Vec<ChainEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrikeKeys {
    pub ce: Option<String>,
    pub pe: Option<String>,
}

/// Option keys to subscribe plus the readable stream alias of each one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstrumentSet {
    pub center_strike: i64,
    pub strikes: BTreeMap<i64, StrikeKeys>,
    /// instrument key -> alias such as `"22500_CE"`
    pub aliases: BTreeMap<String, String>,
}

impl InstrumentSet {
    pub fn keys(&self) -> BTreeSet<String> {
        self.aliases.keys().cloned().collect()
    }
}

/// Nearest multiple of `step`.
pub fn atm_strike(ltp: f64, step: i64) -> i64 {
    if step <= 0 {
        return ltp.round() as i64;
    }
    ((ltp / step as f64).round() as i64) * step
}

/// `center + k*step` for k in `-each_side..=each_side`, ascending.
pub fn strike_ladder(center: i64, step: i64, each_side: usize) -> Vec<i64> {
    let n = each_side as i64;
    (-n..=n).map(|k| center + k * step).collect()
}

/// Nearest Thursday in IST; on Thursday from 15:30 IST onwards, the next one.
pub fn weekly_expiry(now: DateTime<Utc>) -> NaiveDate {
    let local = match FixedOffset::east_opt(IST_OFFSET_SECS) {
        Some(ist) => now.with_timezone(&ist).naive_local(),
        None => now.naive_utc(),
    };

    let today = local.weekday().num_days_from_monday() as i64;
    let thursday = Weekday::Thu.num_days_from_monday() as i64;
    let mut days = (thursday - today).rem_euclid(7);
    if days == 0 && (local.hour(), local.minute()) >= (MARKET_CLOSE_HOUR, MARKET_CLOSE_MINUTE) {
        days = 7;
    }
    local.date() + Duration::days(days)
}

/// Pick CE/PE keys for `strikes` out of a chain response. Strikes missing
/// from the chain are logged and left out.
pub fn select_strikes(chain: &[ChainEntry], strikes: &[i64]) -> InstrumentSet {
    let mut set = InstrumentSet {
        center_strike: strikes.get(strikes.len() / 2).copied().unwrap_or_default(),
        ..InstrumentSet::default()
    };

    for &strike in strikes {
        let Some(entry) = chain.iter().find(|e| e.strike_price.round() as i64 == strike) else {
            warn!("✗ [CHAIN] Strike {} not found in option chain", strike);
            continue;
        };
        let keys = StrikeKeys {
            ce: entry.call_options.as_ref().and_then(|l| l.instrument_key.clone()),
            pe: entry.put_options.as_ref().and_then(|l| l.instrument_key.clone()),
        };
        if let Some(ce) = &keys.ce {
            set.aliases.insert(ce.clone(), format!("{}_CE", strike));
        }
        if let Some(pe) = &keys.pe {
            set.aliases.insert(pe.clone(), format!("{}_PE", strike));
        }
        set.strikes.insert(strike, keys);
    }
    set
}

/// REST client for the option chain endpoint.
#[derive(Clone)]
pub struct OptionChainClient {
    http: reqwest::Client,
    token: String,
    chain_url: String,
    underlying_key: String,
}

impl OptionChainClient {
    pub fn new(token: String, instruments: &InstrumentsConfig, feed: &FeedConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(feed.connect_timeout() * 2)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            token,
            chain_url: instruments.option_chain_url.clone(),
            underlying_key: feed.index_key.clone(),
        }
    }

    pub async fn fetch_chain(&self, expiry: NaiveDate) -> FeedResult<Vec<ChainEntry>> {
        let expiry = expiry.format("%Y-%m-%d").to_string();
        let resp = self
            .http
            .get(&self.chain_url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .query(&[("instrument_key", self.underlying_key.as_str()), ("expiry_date", expiry.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        let chain: OptionChainResponse = resp.json().await?;
        Ok(chain.data)
    }

    /// Fetch the chain and select `center ± k*step`.
    pub async fn fetch_keys(
        &self,
        expiry: NaiveDate,
        center: i64,
        step: i64,
        each_side: usize,
    ) -> FeedResult<InstrumentSet> {
        let chain = self.fetch_chain(expiry).await?;
        let strikes = strike_ladder(center, step, each_side);
        let set = select_strikes(&chain, &strikes);
        info!(
            "🎯 [CHAIN] Expiry {} centre {}: {} option keys",
            expiry,
            center,
            set.aliases.len()
        );
        Ok(set)
    }
}
