use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{info, warn};

use crate::data::repository::{Recorded, RecentSignals, SignalRepository};
use crate::error::{StoreError, StoreResult};
use crate::events::{SignalEnvelope, SignalPayload};

const TABLES: [&str; 6] = [
    "market_patterns",
    "panic_signals",
    "order_imbalance",
    "greeks_momentum",
    "whale_alerts",
    "market_sentiment",
];

/// One table per result type. Every row carries `timestamp` (ms),
/// `instrument_key`, the `signal` label and the result as JSON.
#[derive(Clone)]
pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // In-memory databases are per-connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("🗄️ [DB] Connected to {}", database_url);
        let repo = Self { pool };
        repo.init().await?;
        Ok(repo)
    }

    async fn init(&self) -> StoreResult<()> {
        for table in TABLES {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp INTEGER NOT NULL,
                    instrument_key TEXT NOT NULL,
                    signal TEXT NOT NULL,
                    payload TEXT NOT NULL
                );
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_key_time ON {table} (instrument_key, timestamp);"
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.pool.is_closed() {
            return Err(StoreError::Unavailable("sqlite pool is closed".to_string()));
        }
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        instrument_key: &str,
        limit: usize,
    ) -> StoreResult<Vec<Recorded<T>>> {
        let rows = sqlx::query_as::<_, (i64, String)>(&format!(
            "SELECT timestamp, payload FROM {table} WHERE instrument_key = $1 ORDER BY timestamp DESC, id DESC LIMIT $2"
        ))
        .bind(instrument_key)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (ts_ms, payload) in rows {
            match serde_json::from_str::<T>(&payload) {
                Ok(value) => out.push(Recorded::new(from_millis(ts_ms), value)),
                Err(e) => warn!("[DB] skipping unreadable row in {}: {}", table, e),
            }
        }
        Ok(out)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn payload_json(payload: &SignalPayload) -> serde_json::Result<String> {
    match payload {
        SignalPayload::Pattern(p) | SignalPayload::Panic(p) => serde_json::to_string(p),
        SignalPayload::Imbalance(i) => serde_json::to_string(i),
        SignalPayload::Greeks(g) => serde_json::to_string(g),
        SignalPayload::Whale(w) => serde_json::to_string(w),
        SignalPayload::Sentiment(s) => serde_json::to_string(s),
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn persist(&self, envelope: &SignalEnvelope) -> StoreResult<()> {
        self.ensure_open()?;
        let payload = payload_json(&envelope.payload).map_err(StoreError::Serialization)?;
        sqlx::query(&format!(
            "INSERT INTO {} (timestamp, instrument_key, signal, payload) VALUES ($1, $2, $3, $4)",
            envelope.payload.table()
        ))
        .bind(envelope.timestamp.timestamp_millis())
        .bind(&envelope.instrument_key)
        .bind(envelope.payload.signal_label())
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_recent(&self, instrument_key: &str, limit: usize) -> StoreResult<RecentSignals> {
        self.ensure_open()?;
        Ok(RecentSignals {
            patterns: self.fetch("market_patterns", instrument_key, limit).await?,
            panics: self.fetch("panic_signals", instrument_key, limit).await?,
            imbalances: self.fetch("order_imbalance", instrument_key, limit).await?,
            greeks: self.fetch("greeks_momentum", instrument_key, limit).await?,
            whales: self.fetch("whale_alerts", instrument_key, limit).await?,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("🗄️ [DB] Connection pool closed");
    }
}
