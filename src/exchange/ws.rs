use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, tungstenite::Error as WsError};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::FeedConfig;
use crate::constants::feed::STOP_POLL_INTERVAL;
use crate::data::store::TickStore;
use crate::data::window::stream_key;
use crate::error::{FeedError, FeedResult};

use super::proto::decode_frame;
use super::subscription::{ControlFrame, ControlSink, SubscriptionManager};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Authorizing,
    Connected,
    Streaming,
}

#[derive(Debug)]
pub enum FeedCommand {
    UpdateSubscriptions(BTreeSet<String>, oneshot::Sender<FeedResult<()>>),
}

/// Control side of a running [`FeedClient`].
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    state: watch::Receiver<FeedState>,
    stop: Arc<AtomicBool>,
    aliases: Arc<DashMap<String, String>>,
}

impl FeedHandle {
    /// Make `target` the subscribed option set. Resolves once upstream has
    /// been told (or, while disconnected, once the set was recorded for the
    /// next connect).
    pub async fn update_subscriptions(&self, target: BTreeSet<String>) -> FeedResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(FeedCommand::UpdateSubscriptions(target, reply_tx))
            .await
            .map_err(|_| FeedError::ChannelClosed)?;
        reply_rx.await.map_err(|_| FeedError::ChannelClosed)?
    }

    /// Stream records for `instrument_key` are stored under `alias`.
    pub fn register_alias(&self, instrument_key: impl Into<String>, alias: impl Into<String>) {
        self.aliases.insert(instrument_key.into(), alias.into());
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Writes control frames straight onto the socket.
struct SocketSink<'a, S>(&'a mut S);

#[async_trait]
impl<'a, S> ControlSink for SocketSink<'a, S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    async fn send_control(&mut self, frame: &ControlFrame) -> FeedResult<()> {
        self.0.send(Message::Binary(frame.to_bytes()?)).await?;
        Ok(())
    }
}

/// Upstream market-data feed: authorize, connect, subscribe, then write every
/// decoded market payload to the tick store. Reconnects forever until stopped.
pub struct FeedClient {
    config: FeedConfig,
    token: String,
    http: reqwest::Client,
    store: Arc<dyn TickStore>,
    subscriptions: SubscriptionManager,
    aliases: Arc<DashMap<String, String>>,
    commands: mpsc::Receiver<FeedCommand>,
    state: watch::Sender<FeedState>,
    stop: Arc<AtomicBool>,
}

impl FeedClient {
    pub fn new(config: FeedConfig, token: String, store: Arc<dyn TickStore>) -> (Self, FeedHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(FeedState::Disconnected);
        let stop = Arc::new(AtomicBool::new(false));
        let aliases = Arc::new(DashMap::new());
        aliases.insert(config.index_key.clone(), config.index_alias.clone());

        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let client = Self {
            subscriptions: SubscriptionManager::new(
                config.index_key.clone(),
                config.index_mode.clone(),
                config.option_mode.clone(),
            ),
            config,
            token,
            http,
            store,
            aliases: aliases.clone(),
            commands: cmd_rx,
            state: state_tx,
            stop: stop.clone(),
        };
        let handle = FeedHandle {
            commands: cmd_tx,
            state: state_rx,
            stop,
            aliases,
        };
        (client, handle)
    }

    pub async fn run(mut self) {
        info!("🚀 [FEED] Feed client starting");
        while !self.stopped() {
            match self.connect_and_stream().await {
                Ok(()) => info!("[FEED] Stream closed on stop request"),
                Err(e) => error!("❌ [FEED] Connection error: {}", e),
            }
            self.set_state(FeedState::Disconnected);
            if self.stopped() {
                break;
            }
            info!("🔁 [FEED] Reconnecting in {}s", self.config.reconnect_delay_secs);
            self.wait_for_reconnect().await;
        }
        self.set_state(FeedState::Disconnected);
        info!("🛑 [FEED] Feed client stopped");
    }

    /// Decode one binary frame and append every market payload in it.
    /// Returns how many records were written.
    pub async fn on_frame(&self, bytes: &[u8]) -> FeedResult<usize> {
        let response = decode_frame(bytes)?;
        let retention = self.config.retention();

        let mut written = 0;
        for (instrument_key, feed) in &response.feeds {
            let Some(payload) = feed.market_payload() else {
                continue;
            };
            let alias = self
                .aliases
                .get(instrument_key)
                .map(|a| a.value().clone())
                .unwrap_or_else(|| instrument_key.clone());
            self.store.append(&stream_key(&alias), payload, retention).await?;
            written += 1;
        }
        Ok(written)
    }

    async fn connect_and_stream(&mut self) -> FeedResult<()> {
        self.set_state(FeedState::Authorizing);
        let stream_url = self.authorize().await?;

        let connect_timeout = self.config.connect_timeout();
        let (ws_stream, _) = timeout(connect_timeout, connect_async(stream_url.as_str()))
            .await
            .map_err(|_| FeedError::Timeout {
                secs: connect_timeout.as_secs(),
                during: "connecting to the market stream",
            })??;
        self.set_state(FeedState::Connected);
        info!("✅ [FEED] Connected to {}", stream_url.host_str().unwrap_or("market stream"));

        let (mut write, mut read) = ws_stream.split();
        self.subscriptions.subscribe_all(&mut SocketSink(&mut write)).await?;
        self.set_state(FeedState::Streaming);

        let read_timeout = self.config.read_timeout();
        let mut last_frame = Instant::now();
        let mut stop_poll = tokio::time::interval(STOP_POLL_INTERVAL);
        loop {
            tokio::select! {
                msg = read.next() => {
                    last_frame = Instant::now();
                    match msg {
                        Some(Ok(Message::Binary(bytes))) => match self.on_frame(&bytes).await {
                            Ok(n) => debug!("[FEED] frame -> {} records", n),
                            Err(FeedError::Decode(e)) => warn!("⚠️ [FEED] Dropping undecodable frame: {}", e),
                            Err(e) => warn!("⚠️ [FEED] Failed to store frame: {}", e),
                        },
                        Some(Ok(Message::Ping(payload))) => write.send(Message::Pong(payload)).await?,
                        Some(Ok(Message::Text(text))) => debug!("[FEED] text frame: {}", text),
                        Some(Ok(Message::Close(_))) | None => return Err(FeedError::ConnectionClosed),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                },
                Some(cmd) = self.commands.recv() => match cmd {
                    FeedCommand::UpdateSubscriptions(target, reply) => {
                        let result = self.subscriptions.update(target, &mut SocketSink(&mut write)).await;
                        match result {
                            Ok(()) => {
                                let _ = reply.send(Ok(()));
                            }
                            Err(e) => {
                                let _ = reply.send(Err(FeedError::Protocol(e.to_string())));
                                return Err(e);
                            }
                        }
                    }
                },
                _ = stop_poll.tick() => {
                    if self.stopped() {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                    // Half-open sockets never error; silence is the only sign.
                    if last_frame.elapsed() >= read_timeout {
                        warn!("⏱️ [FEED] No frames for {}s, dropping connection", read_timeout.as_secs());
                        return Err(FeedError::Timeout {
                            secs: read_timeout.as_secs(),
                            during: "waiting for market data",
                        });
                    }
                }
            }
        }
    }

    async fn authorize(&self) -> FeedResult<Url> {
        let resp = self
            .http
            .get(&self.config.authorize_url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await?;
        authorized_stream_url(&body)
    }

    /// Sit out the reconnect delay, still accepting subscription updates.
    async fn wait_for_reconnect(&mut self) {
        let delay = tokio::time::sleep(self.config.reconnect_delay());
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                Some(cmd) = self.commands.recv() => self.apply_offline(cmd),
            }
        }
    }

    fn apply_offline(&mut self, cmd: FeedCommand) {
        match cmd {
            FeedCommand::UpdateSubscriptions(target, reply) => {
                self.subscriptions.replace(target);
                debug!(
                    "[FEED] Offline subscription update recorded ({} keys)",
                    self.subscriptions.active().len()
                );
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn set_state(&self, state: FeedState) {
        self.state.send_replace(state);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Pull the one-time stream endpoint out of the authorization response.
pub fn authorized_stream_url(body: &Value) -> FeedResult<Url> {
    let uri = body
        .pointer("/data/authorized_redirect_uri")
        .and_then(Value::as_str)
        .ok_or_else(|| FeedError::Authorization {
            reason: "response has no data.authorized_redirect_uri".to_string(),
        })?;
    Url::parse(uri).map_err(|e| FeedError::Authorization {
        reason: format!("invalid stream url {}: {}", uri, e),
    })
}
