//! Follows the index's at-the-money strike and keeps the option
//! subscriptions centred on it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::InstrumentsConfig;
use crate::data::store::TickStore;
use crate::data::tick::Tick;
use crate::data::window::stream_key;
use crate::error::FeedResult;
use crate::exchange::instruments::{atm_strike, weekly_expiry, InstrumentSet, OptionChainClient};
use crate::exchange::ws::FeedHandle;

/// Where option keys for a centre strike come from.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_keys(
        &self,
        expiry: NaiveDate,
        center: i64,
        step: i64,
        each_side: usize,
    ) -> FeedResult<InstrumentSet>;
}

#[async_trait]
impl ChainSource for OptionChainClient {
    async fn fetch_keys(
        &self,
        expiry: NaiveDate,
        center: i64,
        step: i64,
        each_side: usize,
    ) -> FeedResult<InstrumentSet> {
        OptionChainClient::fetch_keys(self, expiry, center, step, each_side).await
    }
}

/// The running feed, as seen by the tracker.
#[async_trait]
pub trait SubscriptionTarget: Send + Sync {
    fn register_alias(&self, instrument_key: &str, alias: &str);

    async fn update_subscriptions(&self, target: BTreeSet<String>) -> FeedResult<()>;
}

#[async_trait]
impl SubscriptionTarget for FeedHandle {
    fn register_alias(&self, instrument_key: &str, alias: &str) {
        FeedHandle::register_alias(self, instrument_key, alias);
    }

    async fn update_subscriptions(&self, target: BTreeSet<String>) -> FeedResult<()> {
        FeedHandle::update_subscriptions(self, target).await
    }
}

pub struct StrikeTracker {
    store: Arc<dyn TickStore>,
    chain: Arc<dyn ChainSource>,
    feed: Arc<dyn SubscriptionTarget>,
    clock: Arc<dyn Clock>,
    config: InstrumentsConfig,
    index_alias: String,
    current: Option<(i64, NaiveDate)>,
    stop: Arc<AtomicBool>,
}

impl StrikeTracker {
    pub fn new(
        store: Arc<dyn TickStore>,
        chain: Arc<dyn ChainSource>,
        feed: Arc<dyn SubscriptionTarget>,
        clock: Arc<dyn Clock>,
        config: InstrumentsConfig,
        index_alias: impl Into<String>,
    ) -> Self {
        Self {
            store,
            chain,
            feed,
            clock,
            config,
            index_alias: index_alias.into(),
            current: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Centre strike currently subscribed, if any
    pub fn current_center(&self) -> Option<i64> {
        self.current.map(|(center, _)| center)
    }

    /// Configured expiry, or the nearest weekly one.
    pub fn expiry(&self, now: DateTime<Utc>) -> NaiveDate {
        if let Some(raw) = &self.config.expiry {
            match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => return date,
                Err(e) => warn!("⚠️ [STRIKES] Ignoring expiry {:?}: {}", raw, e),
            }
        }
        weekly_expiry(now)
    }

    /// Latest index price in the tick store, if it has ticked.
    pub async fn index_ltp(&self) -> FeedResult<Option<f64>> {
        let latest = self.store.latest(&stream_key(&self.index_alias)).await?;
        Ok(latest
            .map(|entry| Tick::from_record(&entry.fields).last_price)
            .filter(|ltp| *ltp > 0.0))
    }

    /// Re-centre when the ATM strike or the expiry moved.
    /// Returns the new centre when subscriptions changed.
    pub async fn refresh(&mut self) -> FeedResult<Option<i64>> {
        let Some(ltp) = self.index_ltp().await? else {
            debug!("[STRIKES] No index tick yet");
            return Ok(None);
        };
        let center = atm_strike(ltp, self.config.strike_step);
        self.recenter(center).await
    }

    pub async fn recenter(&mut self, center: i64) -> FeedResult<Option<i64>> {
        let expiry = self.expiry(self.clock.now());
        if self.current == Some((center, expiry)) {
            return Ok(None);
        }

        let set = self
            .chain
            .fetch_keys(expiry, center, self.config.strike_step, self.config.strikes_each_side)
            .await?;
        if set.aliases.is_empty() {
            warn!("⚠️ [STRIKES] Option chain had no keys around {} ({})", center, expiry);
            return Ok(None);
        }

        for (key, alias) in &set.aliases {
            self.feed.register_alias(key, alias);
        }
        self.feed.update_subscriptions(set.keys()).await?;

        match self.current {
            Some((previous, _)) => info!("🔄 [STRIKES] ATM {} -> {} ({} keys)", previous, center, set.aliases.len()),
            None => info!("🎯 [STRIKES] Subscribed around {} ({} keys)", center, set.aliases.len()),
        }
        self.current = Some((center, expiry));
        Ok(Some(center))
    }

    pub async fn run(mut self) {
        if let Some(center) = self.config.center_strike {
            if let Err(e) = self.recenter(center).await {
                error!("❌ [STRIKES] Initial subscription around {} failed: {}", center, e);
            }
        }

        let interval = Duration::from_secs(self.config.refresh_interval_secs.max(1));
        while !self.stop.load(Ordering::SeqCst) {
            if let Err(e) = self.refresh().await {
                warn!("⚠️ [STRIKES] Refresh failed: {}", e);
            }
            tokio::time::sleep(interval).await;
        }
        info!("🛑 [STRIKES] Strike tracker stopped");
    }
}
