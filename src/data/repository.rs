//! Durable signal history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::analytics::{GreeksMomentumResult, ImbalanceResult, PatternResult, SentimentResult, WhaleAlert};
use crate::constants::store::MEMORY_ROWS_PER_TABLE;
use crate::error::StoreResult;
use crate::events::{SignalEnvelope, SignalPayload};

/// A persisted row: the result plus when it was produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded<T> {
    pub timestamp: DateTime<Utc>,
    pub value: T,
}

impl<T> Recorded<T> {
    pub fn new(timestamp: DateTime<Utc>, value: T) -> Self {
        Self { timestamp, value }
    }
}

/// Most recent rows per result type, newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecentSignals {
    pub patterns: Vec<Recorded<PatternResult>>,
    pub panics: Vec<Recorded<PatternResult>>,
    pub imbalances: Vec<Recorded<ImbalanceResult>>,
    pub greeks: Vec<Recorded<GreeksMomentumResult>>,
    pub whales: Vec<Recorded<WhaleAlert>>,
}

impl RecentSignals {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.panics.is_empty()
            && self.imbalances.is_empty()
            && self.greeks.is_empty()
            && self.whales.is_empty()
    }
}

#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Insert one row into the table for the envelope's payload kind.
    async fn persist(&self, envelope: &SignalEnvelope) -> StoreResult<()>;

    /// Up to `limit` rows per table for `instrument_key`, newest first.
    async fn query_recent(&self, instrument_key: &str, limit: usize) -> StoreResult<RecentSignals>;

    /// Release backing resources. Later calls fail with `Unavailable`.
    async fn close(&self) {}
}

/// Rows kept for one instrument: one timestamp-ordered deque per table.
/// `seq` records arrival order across tables.
#[derive(Default)]
struct InstrumentRows {
    next_seq: u64,
    tables: HashMap<&'static str, VecDeque<(u64, SignalEnvelope)>>,
}

/// Bounded in-memory history, grouped by instrument. Each table keeps at most
/// `capacity` rows per instrument; the oldest row goes first.
#[derive(Clone)]
pub struct InMemorySignalRepository {
    rows: Arc<DashMap<String, InstrumentRows>>,
    capacity: usize,
}

impl Default for InMemorySignalRepository {
    fn default() -> Self {
        Self::with_capacity(MEMORY_ROWS_PER_TABLE)
    }
}

impl InMemorySignalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Row count in `table` across all instruments
    pub fn count(&self, table: &str) -> usize {
        self.rows
            .iter()
            .map(|e| e.value().tables.get(table).map(|q| q.len()).unwrap_or(0))
            .sum()
    }

    /// Every retained row for `instrument_key`, in arrival order.
    pub fn rows_for(&self, instrument_key: &str) -> Vec<SignalEnvelope> {
        let Some(rows) = self.rows.get(instrument_key) else {
            return Vec::new();
        };
        let mut all: Vec<&(u64, SignalEnvelope)> = rows.tables.values().flatten().collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, env)| env.clone()).collect()
    }
}

fn newest<T>(
    rows: &InstrumentRows,
    table: &str,
    limit: usize,
    pick: impl Fn(&SignalPayload) -> Option<&T>,
) -> Vec<Recorded<T>>
where
    T: Clone,
{
    rows.tables
        .get(table)
        .map(|q| {
            q.iter()
                .rev()
                .filter_map(|(_, env)| pick(&env.payload).map(|v| Recorded::new(env.timestamp, v.clone())))
                .take(limit)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SignalRepository for InMemorySignalRepository {
    async fn persist(&self, envelope: &SignalEnvelope) -> StoreResult<()> {
        let mut rows = self.rows.entry(envelope.instrument_key.clone()).or_default();
        let seq = rows.next_seq;
        rows.next_seq += 1;

        let queue = rows.tables.entry(envelope.payload.table()).or_default();
        // Equal timestamps keep arrival order, so the back is always newest.
        let at = queue.partition_point(|(_, env)| env.timestamp <= envelope.timestamp);
        queue.insert(at, (seq, envelope.clone()));
        while queue.len() > self.capacity {
            queue.pop_front();
        }
        Ok(())
    }

    async fn query_recent(&self, instrument_key: &str, limit: usize) -> StoreResult<RecentSignals> {
        let Some(rows) = self.rows.get(instrument_key) else {
            return Ok(RecentSignals::default());
        };
        Ok(RecentSignals {
            patterns: newest(&rows, "market_patterns", limit, |p| match p {
                SignalPayload::Pattern(v) => Some(v),
                _ => None,
            }),
            panics: newest(&rows, "panic_signals", limit, |p| match p {
                SignalPayload::Panic(v) => Some(v),
                _ => None,
            }),
            imbalances: newest(&rows, "order_imbalance", limit, |p| match p {
                SignalPayload::Imbalance(v) => Some(v),
                _ => None,
            }),
            greeks: newest(&rows, "greeks_momentum", limit, |p| match p {
                SignalPayload::Greeks(v) => Some(v),
                _ => None,
            }),
            whales: newest(&rows, "whale_alerts", limit, |p| match p {
                SignalPayload::Whale(v) => Some(v),
                _ => None,
            }),
        })
    }
}

/// Newest sentiment row in `rows` (insertion order)
pub fn latest_sentiment(rows: &[SignalEnvelope]) -> Option<&SentimentResult> {
    rows.iter()
        .rev()
        .find_map(|env| match &env.payload {
            SignalPayload::Sentiment(s) => Some(s),
            _ => None,
        })
}
