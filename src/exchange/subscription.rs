use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use crate::error::FeedResult;

/// Subscribe/unsubscribe control message, sent as a binary frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub guid: String,
    pub method: String,
    pub data: ControlData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlData {
    pub mode: String,
    pub instrument_keys: Vec<String>,
}

impl ControlFrame {
    pub fn subscribe(mode: &str, keys: Vec<String>) -> Self {
        Self::new("sub", mode, keys)
    }

    pub fn unsubscribe(mode: &str, keys: Vec<String>) -> Self {
        Self::new("unsub", mode, keys)
    }

    fn new(method: &str, mode: &str, instrument_keys: Vec<String>) -> Self {
        Self {
            guid: Uuid::new_v4().to_string(),
            method: method.to_string(),
            data: ControlData {
                mode: mode.to_string(),
                instrument_keys,
            },
        }
    }

    pub fn to_bytes(&self) -> FeedResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Where control frames go. The live socket in production, a recorder in tests.
#[async_trait]
pub trait ControlSink: Send {
    async fn send_control(&mut self, frame: &ControlFrame) -> FeedResult<()>;
}

/// Tracks the option keys currently subscribed and turns a new target set
/// into the minimal sub/unsub frames.
#[derive(Clone, Debug)]
pub struct SubscriptionManager {
    index_key: String,
    index_mode: String,
    option_mode: String,
    active: BTreeSet<String>,
}

impl SubscriptionManager {
    pub fn new(index_key: impl Into<String>, index_mode: impl Into<String>, option_mode: impl Into<String>) -> Self {
        Self {
            index_key: index_key.into(),
            index_mode: index_mode.into(),
            option_mode: option_mode.into(),
            active: BTreeSet::new(),
        }
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Replace the active set without talking to upstream (no connection).
    pub fn replace(&mut self, target: BTreeSet<String>) {
        self.active = self.without_index(target);
    }

    /// Index plus every active option key, sent right after (re)connecting.
    pub async fn subscribe_all<S: ControlSink>(&self, sink: &mut S) -> FeedResult<()> {
        sink.send_control(&ControlFrame::subscribe(&self.index_mode, vec![self.index_key.clone()]))
            .await?;
        if !self.active.is_empty() {
            sink.send_control(&ControlFrame::subscribe(
                &self.option_mode,
                self.active.iter().cloned().collect(),
            ))
            .await?;
        }
        info!("📡 [FEED] Subscribed index + {} option keys", self.active.len());
        Ok(())
    }

    /// Unsubscribe what left, subscribe what joined. The active set only
    /// changes once every frame went out.
    pub async fn update<S: ControlSink>(&mut self, target: BTreeSet<String>, sink: &mut S) -> FeedResult<()> {
        let target = self.without_index(target);
        let removed: Vec<String> = self.active.difference(&target).cloned().collect();
        let added: Vec<String> = target.difference(&self.active).cloned().collect();

        if !removed.is_empty() {
            sink.send_control(&ControlFrame::unsubscribe(&self.option_mode, removed.clone()))
                .await?;
        }
        if !added.is_empty() {
            sink.send_control(&ControlFrame::subscribe(&self.option_mode, added.clone()))
                .await?;
        }

        if !removed.is_empty() || !added.is_empty() {
            info!(
                "🔄 [FEED] Subscriptions updated: +{} -{} (now {})",
                added.len(),
                removed.len(),
                target.len()
            );
        }
        self.active = target;
        Ok(())
    }

    fn without_index(&self, mut keys: BTreeSet<String>) -> BTreeSet<String> {
        keys.remove(&self.index_key);
        keys
    }
}
