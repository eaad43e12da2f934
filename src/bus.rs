use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::events::{Published, SignalEnvelope};

/// Fire-and-forget fan-out of finished signals.
#[async_trait]
pub trait SignalPublisher: Send + Sync {
    /// Returns how many subscribers received the payload.
    async fn publish(&self, topic: &str, envelope: &SignalEnvelope) -> StoreResult<usize>;
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Published>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl SignalPublisher for EventBus {
    async fn publish(&self, topic: &str, envelope: &SignalEnvelope) -> StoreResult<usize> {
        let payload = envelope.to_json().map_err(StoreError::Serialization)?;
        match self.tx.send(Published {
            topic: topic.to_string(),
            payload,
        }) {
            Ok(n) => Ok(n),
            Err(_) => {
                // Nobody listening: dropped, best-effort.
                debug!("[BUS] no subscribers for {}", topic);
                Ok(0)
            }
        }
    }
}
