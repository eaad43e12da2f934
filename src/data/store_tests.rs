//! Unit tests for MarketStore - the in-memory tick store.

#[cfg(test)]
mod store_tests {
    use crate::clock::ManualClock;
    use crate::data::repository::{InMemorySignalRepository, SignalRepository};
    use crate::data::store::{MarketStore, TickStore};
    use crate::events::{SignalEnvelope, SignalPayload};
    use crate::analytics::PatternResult;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const RETENTION: Duration = Duration::from_secs(120);

    fn store_at_epoch() -> (MarketStore, ManualClock) {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_000_000).unwrap());
        (MarketStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_append_returns_increasing_ids() {
        let (store, clock) = store_at_epoch();

        let a = store.append("stream:X", json!({"n": 1}), RETENTION).await.unwrap();
        let b = store.append("stream:X", json!({"n": 2}), RETENTION).await.unwrap();
        clock.advance(ChronoDuration::milliseconds(5));
        let c = store.append("stream:X", json!({"n": 3}), RETENTION).await.unwrap();

        assert_eq!(a, "1000000-0");
        assert_eq!(b, "1000000-1");
        assert_eq!(c, "1000005-0");
    }

    #[tokio::test]
    async fn test_clock_going_back_stays_monotonic() {
        let (store, clock) = store_at_epoch();
        store.append("stream:X", json!({}), RETENTION).await.unwrap();
        clock.advance(ChronoDuration::milliseconds(-50));
        let id = store.append("stream:X", json!({}), RETENTION).await.unwrap();
        assert_eq!(id, "1000000-1");
    }

    #[tokio::test]
    async fn test_range_is_half_open_and_ordered() {
        let (store, clock) = store_at_epoch();
        for i in 0..5 {
            store.append("stream:X", json!({"n": i}), RETENTION).await.unwrap();
            clock.advance(ChronoDuration::seconds(10));
        }

        // timestamps: 1_000_000, 1_010_000, ... 1_040_000
        let got = store.range("stream:X", 1_010_000, 1_030_000).await.unwrap();
        let ns: Vec<i64> = got.iter().map(|e| e.fields["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_range_on_missing_stream_is_empty() {
        let store = MarketStore::new();
        assert!(store.range("stream:nope", 0, i64::MAX).await.unwrap().is_empty());
        assert!(store.latest("stream:nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retention_trims_old_records() {
        let (store, clock) = store_at_epoch();
        store.append("stream:X", json!({"n": 0}), RETENTION).await.unwrap();
        clock.advance(ChronoDuration::seconds(60));
        store.append("stream:X", json!({"n": 1}), RETENTION).await.unwrap();
        assert_eq!(store.stream_len("stream:X"), 2);

        clock.advance(ChronoDuration::seconds(61));
        store.append("stream:X", json!({"n": 2}), RETENTION).await.unwrap();

        assert_eq!(store.stream_len("stream:X"), 2);
        let latest = store.latest("stream:X").await.unwrap().unwrap();
        assert_eq!(latest.fields["n"], 2);
    }

    #[tokio::test]
    async fn test_silent_streams_are_evicted() {
        let (store, clock) = store_at_epoch();
        store.append("stream:OLD", json!({"n": 0}), RETENTION).await.unwrap();
        store.append("stream:LIVE", json!({"n": 0}), RETENTION).await.unwrap();

        clock.advance(ChronoDuration::seconds(100));
        store.append("stream:LIVE", json!({"n": 1}), RETENTION).await.unwrap();
        // Still inside retention
        assert_eq!(store.stream_len("stream:OLD"), 1);

        clock.advance(ChronoDuration::seconds(21));
        store.append("stream:LIVE", json!({"n": 2}), RETENTION).await.unwrap();

        assert_eq!(store.stream_len("stream:OLD"), 0);
        assert_eq!(store.scan_keys("stream:").await.unwrap(), vec!["stream:LIVE".to_string()]);
        assert_eq!(store.stream_len("stream:LIVE"), 2);
    }

    #[tokio::test]
    async fn test_scan_keys_by_prefix() {
        let store = MarketStore::new();
        store.append("stream:B", json!({}), RETENTION).await.unwrap();
        store.append("stream:A", json!({}), RETENTION).await.unwrap();
        store.append("other:C", json!({}), RETENTION).await.unwrap();

        let keys = store.scan_keys("stream:").await.unwrap();
        assert_eq!(keys, vec!["stream:A".to_string(), "stream:B".to_string()]);
    }

    #[tokio::test]
    async fn test_appended_record_is_visible_immediately() {
        let (store, clock) = store_at_epoch();
        store.append("stream:X", json!({"n": 7}), RETENTION).await.unwrap();
        let now = clock_ms(&clock);
        let got = store.range("stream:X", now - 60_000, now + 1).await.unwrap();
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_repository_groups_and_limits() {
        let repo = InMemorySignalRepository::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 2, 4, 0, 0).unwrap();
        for i in 0..4 {
            let mut pattern = PatternResult::insufficient_data();
            pattern.last_price = i as f64;
            repo.persist(&SignalEnvelope::new(
                t0 + ChronoDuration::minutes(i),
                "NSE_FO|1",
                SignalPayload::Pattern(pattern),
            ))
            .await
            .unwrap();
        }

        let recent = repo.query_recent("NSE_FO|1", 3).await.unwrap();
        assert_eq!(recent.patterns.len(), 3);
        assert_eq!(recent.patterns[0].value.last_price, 3.0);
        assert_eq!(recent.patterns[2].value.last_price, 1.0);
        assert_eq!(repo.count("market_patterns"), 4);
        assert!(repo.query_recent("NSE_FO|2", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_repository_is_bounded() {
        let repo = InMemorySignalRepository::with_capacity(5);
        let t0 = Utc.with_ymd_and_hms(2024, 5, 2, 4, 0, 0).unwrap();
        for i in 0..50 {
            let mut pattern = PatternResult::insufficient_data();
            pattern.last_price = i as f64;
            repo.persist(&SignalEnvelope::new(
                t0 + ChronoDuration::minutes(i),
                "NSE_FO|1",
                SignalPayload::Pattern(pattern.clone()),
            ))
            .await
            .unwrap();
            if i % 10 == 0 {
                repo.persist(&SignalEnvelope::new(
                    t0 + ChronoDuration::minutes(i),
                    "NSE_FO|1",
                    SignalPayload::Panic(pattern),
                ))
                .await
                .unwrap();
            }
        }

        assert_eq!(repo.count("market_patterns"), 5);
        assert_eq!(repo.count("panic_signals"), 5);
        assert_eq!(repo.rows_for("NSE_FO|1").len(), 10);

        let recent = repo.query_recent("NSE_FO|1", 3).await.unwrap();
        let prices: Vec<f64> = recent.patterns.iter().map(|p| p.value.last_price).collect();
        assert_eq!(prices, vec![49.0, 48.0, 47.0]);
        assert_eq!(recent.panics[0].value.last_price, 40.0);
    }

    #[tokio::test]
    async fn test_in_memory_repository_orders_late_rows_by_time() {
        let repo = InMemorySignalRepository::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 2, 4, 0, 0).unwrap();
        for (minute, price) in [(2, 2.0), (0, 0.0), (1, 1.0)] {
            let mut pattern = PatternResult::insufficient_data();
            pattern.last_price = price;
            repo.persist(&SignalEnvelope::new(
                t0 + ChronoDuration::minutes(minute),
                "NSE_FO|1",
                SignalPayload::Pattern(pattern),
            ))
            .await
            .unwrap();
        }

        let recent = repo.query_recent("NSE_FO|1", 10).await.unwrap();
        let prices: Vec<f64> = recent.patterns.iter().map(|p| p.value.last_price).collect();
        assert_eq!(prices, vec![2.0, 1.0, 0.0]);
    }

    fn clock_ms(clock: &ManualClock) -> i64 {
        use crate::clock::Clock;
        clock.now_ms()
    }
}
