use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::constants::store::STALE_SWEEP_INTERVAL_MS;
use crate::error::StoreResult;

/// One record in a per-instrument stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEntry {
    /// `"<arrival ms>-<seq>"`, strictly increasing per stream
    pub id: String,
    pub timestamp_ms: i64,
    pub fields: Value,
}

/// Append-only, time-ordered, per-key log with bounded retention.
#[async_trait]
pub trait TickStore: Send + Sync {
    /// Append a record stamped with the store's arrival time, then drop
    /// everything older than `retention` from the same stream.
    async fn append(&self, stream_key: &str, fields: Value, retention: Duration) -> StoreResult<String>;

    /// Records with `from_ms <= timestamp < to_ms`, oldest first.
    async fn range(&self, stream_key: &str, from_ms: i64, to_ms: i64) -> StoreResult<Vec<StreamEntry>>;

    async fn latest(&self, stream_key: &str) -> StoreResult<Option<StreamEntry>>;

    async fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// In-memory tick store shared between the feed client and the orchestrator.
#[derive(Clone)]
pub struct MarketStore {
    streams: Arc<DashMap<String, VecDeque<StreamEntry>>>,
    clock: Arc<dyn Clock>,
    last_sweep_ms: Arc<AtomicI64>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            clock,
            last_sweep_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn stream_len(&self, stream_key: &str) -> usize {
        self.streams.get(stream_key).map(|q| q.len()).unwrap_or(0)
    }

    /// Drop whole streams whose newest record is older than `min_ms`, at most
    /// once per sweep interval. Unsubscribed instruments stop ticking, so
    /// their own appends never trim them.
    fn sweep_stale(&self, now_ms: i64, min_ms: i64) {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms - last < STALE_SWEEP_INTERVAL_MS {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let before = self.streams.len();
        self.streams
            .retain(|_, queue| queue.back().map(|e| e.timestamp_ms >= min_ms).unwrap_or(false));
        let evicted = before.saturating_sub(self.streams.len());
        if evicted > 0 {
            debug!("🧹 [STORE] Evicted {} stale streams", evicted);
        }
    }

    fn next_id(queue: &VecDeque<StreamEntry>, now_ms: i64) -> (i64, u64) {
        match queue.back() {
            Some(last) => {
                let (last_ms, last_seq) = parse_id(&last.id);
                if now_ms > last_ms {
                    (now_ms, 0)
                } else {
                    // Clock did not advance (or went back): stay monotonic.
                    (last_ms, last_seq + 1)
                }
            }
            None => (now_ms, 0),
        }
    }
}

impl Default for MarketStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_id(id: &str) -> (i64, u64) {
    let mut parts = id.splitn(2, '-');
    let ms = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let seq = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (ms, seq)
}

#[async_trait]
impl TickStore for MarketStore {
    async fn append(&self, stream_key: &str, fields: Value, retention: Duration) -> StoreResult<String> {
        let now_ms = self.clock.now_ms();
        let min_ms = now_ms - retention.as_millis() as i64;

        let id = {
            let mut queue = self.streams.entry(stream_key.to_string()).or_default();
            let (ts, seq) = Self::next_id(&queue, now_ms);
            let id = format!("{}-{}", ts, seq);
            queue.push_back(StreamEntry {
                id: id.clone(),
                timestamp_ms: ts,
                fields,
            });

            while queue.front().map(|e| e.timestamp_ms < min_ms).unwrap_or(false) {
                queue.pop_front();
            }
            id
        };

        // The entry guard above must be released before touching other shards.
        self.sweep_stale(now_ms, min_ms);
        Ok(id)
    }

    async fn range(&self, stream_key: &str, from_ms: i64, to_ms: i64) -> StoreResult<Vec<StreamEntry>> {
        let Some(queue) = self.streams.get(stream_key) else {
            return Ok(Vec::new());
        };
        Ok(queue
            .iter()
            .filter(|e| e.timestamp_ms >= from_ms && e.timestamp_ms < to_ms)
            .cloned()
            .collect())
    }

    async fn latest(&self, stream_key: &str) -> StoreResult<Option<StreamEntry>> {
        Ok(self
            .streams
            .get(stream_key)
            .and_then(|q| q.back().cloned()))
    }

    async fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .streams
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
