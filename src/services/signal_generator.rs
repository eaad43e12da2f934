//! Minute-aligned cycle orchestrator: window every live stream, run the
//! analyzers, publish and persist their results.

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::analytics::{
    analyze_greeks_momentum, analyze_market_sentiment, analyze_oi_pattern, analyze_order_book_imbalance,
    analyze_whale_activity,
};
use crate::bus::SignalPublisher;
use crate::clock::Clock;
use crate::config::SignalsConfig;
use crate::constants::feed::STOP_POLL_INTERVAL;
use crate::constants::store::{STREAM_PREFIX, TRADE_SIGNALS_TOPIC};
use crate::data::repository::SignalRepository;
use crate::data::store::TickStore;
use crate::data::window::{to_arrays, WindowAggregator};
use crate::error::CycleError;
use crate::events::{SignalEnvelope, SignalPayload};
use crate::services::scheduler::MinuteTicker;

/// Outcome counts for one cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Whale alerts raised across all instruments
    pub alerts: usize,
}

pub struct SignalGenerator {
    store: Arc<dyn TickStore>,
    aggregator: WindowAggregator,
    publisher: Arc<dyn SignalPublisher>,
    repository: Arc<dyn SignalRepository>,
    clock: Arc<dyn Clock>,
    config: SignalsConfig,
    stop: Arc<AtomicBool>,
}

impl SignalGenerator {
    pub fn new(
        store: Arc<dyn TickStore>,
        publisher: Arc<dyn SignalPublisher>,
        repository: Arc<dyn SignalRepository>,
        clock: Arc<dyn Clock>,
        config: SignalsConfig,
    ) -> Self {
        Self {
            aggregator: WindowAggregator::new(store.clone()),
            store,
            publisher,
            repository,
            clock,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with whoever needs to stop the loop.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    async fn wait_for_stop(&self) {
        while !self.stopped() {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    pub async fn run(&self) {
        info!(
            "🚀 [CYCLE] Signal generator started (window {}s, {} worker(s))",
            self.config.window_secs, self.config.max_concurrent_instruments
        );
        let ticker = MinuteTicker::new(self.clock.clone());

        while !self.stopped() {
            let now = tokio::select! {
                now = ticker.tick() => now,
                _ = self.wait_for_stop() => break,
            };
            let report = self.run_cycle(now).await;
            info!(
                "✅ [CYCLE] {} processed={} skipped={} failed={} whales={}",
                now.format("%H:%M:%S"),
                report.processed,
                report.skipped,
                report.failed,
                report.alerts
            );
        }
        info!("🛑 [CYCLE] Signal generator stopped");
    }

    /// One pass over every live stream for the window `[now - window, now)`.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let to_ms = now.timestamp_millis();
        let from_ms = to_ms - self.config.window_secs * 1000;

        let keys = match self.store.scan_keys(STREAM_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("❌ [CYCLE] Stream scan failed: {}", e);
                return CycleReport::default();
            }
        };
        if keys.is_empty() {
            debug!("[CYCLE] No live streams");
            return CycleReport::default();
        }

        let workers = self.config.max_concurrent_instruments.max(1);
        let outcomes: Vec<(String, Result<usize, CycleError>)> = stream::iter(keys)
            .map(|stream_key| async move {
                let instrument_key = stream_key
                    .strip_prefix(STREAM_PREFIX)
                    .unwrap_or(&stream_key)
                    .to_string();
                let outcome = self.process_instrument(&instrument_key, now, from_ms, to_ms).await;
                (instrument_key, outcome)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut report = CycleReport::default();
        for (instrument_key, outcome) in outcomes {
            match outcome {
                Ok(alerts) => {
                    report.processed += 1;
                    report.alerts += alerts;
                }
                Err(CycleError::EmptyWindow { .. }) => {
                    debug!("[CYCLE] {} skipped: no ticks in window", instrument_key);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("⚠️ [CYCLE] {} failed: {}", instrument_key, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Analyze one instrument, returning the number of whale alerts.
    pub async fn process_instrument(
        &self,
        instrument_key: &str,
        now: DateTime<Utc>,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<usize, CycleError> {
        let ticks = self.aggregator.fetch_range(instrument_key, from_ms, to_ms).await?;
        if ticks.is_empty() {
            return Err(CycleError::EmptyWindow {
                instrument_key: instrument_key.to_string(),
            });
        }
        let arrays = to_arrays(&ticks);

        let pattern = analyze_oi_pattern(&arrays, &self.config.pattern);
        let imbalance = analyze_order_book_imbalance(&arrays);
        let greeks = analyze_greeks_momentum(&arrays, self.config.window_secs as f64);
        let whales = analyze_whale_activity(&arrays);

        let envelope = |payload| SignalEnvelope::new(now, instrument_key, payload);

        let pattern_env = envelope(SignalPayload::Pattern(pattern.clone()));
        if let Err(e) = self.publisher.publish(TRADE_SIGNALS_TOPIC, &pattern_env).await {
            warn!("⚠️ [CYCLE] Publish failed for {}: {}", instrument_key, e);
        }
        self.repository.persist(&pattern_env).await?;

        if pattern.is_panic {
            warn!(
                "🚨 [PANIC] {} {} ({:+.2}%, OI {:+})",
                instrument_key, pattern.pattern, pattern.price_change_pct, pattern.oi_change
            );
            self.repository
                .persist(&envelope(SignalPayload::Panic(pattern.clone())))
                .await?;
        }

        self.repository
            .persist(&envelope(SignalPayload::Imbalance(imbalance)))
            .await?;
        self.repository
            .persist(&envelope(SignalPayload::Greeks(greeks)))
            .await?;

        for alert in &whales {
            info!(
                "🐋 [WHALE] {} {} {} ({})",
                instrument_key, alert.whale_type, alert.alert_type, alert.alert_value
            );
            self.repository
                .persist(&envelope(SignalPayload::Whale(alert.clone())))
                .await?;
        }

        let recent = self
            .repository
            .query_recent(instrument_key, self.config.history_limit)
            .await?;
        let ltp = arrays.last_ltp().unwrap_or(pattern.last_price);
        let sentiment = analyze_market_sentiment(&recent, ltp);
        debug!(
            "[CYCLE] {} {} ({}) {}",
            instrument_key, pattern.pattern, sentiment.sentiment, sentiment.sentiment_score
        );
        self.repository
            .persist(&envelope(SignalPayload::Sentiment(sentiment)))
            .await?;

        Ok(whales.len())
    }
}
