//! Minute-boundary ticker driven by an injected [`Clock`].

use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::constants::signals::MIN_ALIGN_SLEEP_MS;

pub struct MinuteTicker {
    clock: Arc<dyn Clock>,
}

impl MinuteTicker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Time left until the next `:00` second, never below 100 ms.
    pub fn delay_until_next_minute(&self) -> Duration {
        delay_until_next_minute(self.clock.now())
    }

    /// Sleep to the next minute boundary and return the clock's time on wake.
    pub async fn tick(&self) -> DateTime<Utc> {
        let delay = self.delay_until_next_minute();
        debug!("[SCHED] Sleeping {:.3}s to next minute", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
        self.clock.now()
    }
}

pub fn delay_until_next_minute(now: DateTime<Utc>) -> Duration {
    // Leap seconds report nanos past 1e9
    let nanos = now.nanosecond().min(999_999_999) as i64;
    let elapsed_ms = now.second() as i64 * 1000 + nanos / 1_000_000;
    let remaining_ms = 60_000 - elapsed_ms;
    Duration::from_millis(remaining_ms.max(MIN_ALIGN_SLEEP_MS) as u64)
}
