//! Integration tests for the signal pipeline.
//! These tests drive feed frames through the tick store and a full cycle.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use prost::Message as _;
use rust_whalehunter::analytics::signal::{
    AlertType, MomentumSignal, MomentumType, Pattern, PatternSignal, SentimentLabel, WhaleSignal, WhaleType,
};
use rust_whalehunter::bus::EventBus;
use rust_whalehunter::clock::ManualClock;
use rust_whalehunter::config::{FeedConfig, SignalsConfig};
use rust_whalehunter::data::repository::latest_sentiment;
use rust_whalehunter::data::{InMemorySignalRepository, MarketStore, SignalRepository, SqliteSignalRepository};
use rust_whalehunter::events::{SignalEnvelope, SignalPayload};
use rust_whalehunter::exchange::proto::{
    feed, full_feed, Feed, FeedResponse, FullFeed, IndexFullFeed, Ltpc, MarketFullFeed, MarketLevel, OptionGreeks,
    Quote,
};
use futures_util::{SinkExt, StreamExt};
use rust_whalehunter::exchange::{ControlFrame, FeedClient, FeedHandle, FeedState};
use rust_whalehunter::services::SignalGenerator;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

const CE_KEY: &str = "NSE_FO|43885";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 4, 0, 0).unwrap()
}

#[derive(Clone, Copy)]
struct OptionTick {
    ltp: f64,
    oi: f64,
    vtt: i64,
    delta: f64,
    gamma: f64,
    iv: f64,
    bid_q: i64,
}

impl Default for OptionTick {
    fn default() -> Self {
        Self {
            ltp: 100.0,
            oi: 10_000.0,
            vtt: 1_000,
            delta: 0.5,
            gamma: 0.01,
            iv: 20.0,
            bid_q: 500,
        }
    }
}

fn full_feed(body: full_feed::Body) -> Feed {
    Feed {
        body: Some(feed::Body::FullFeed(FullFeed { body: Some(body) })),
        request_mode: 3,
    }
}

fn option_feed(t: OptionTick) -> Feed {
    full_feed(full_feed::Body::MarketFf(MarketFullFeed {
        ltpc: Some(Ltpc {
            ltp: t.ltp,
            ltt: 1_714_968_000_000,
            ltq: 75,
            cp: 95.0,
        }),
        market_level: Some(MarketLevel {
            bid_ask_quote: vec![Quote {
                bid_q: t.bid_q,
                bid_p: t.ltp - 0.05,
                ask_q: 400,
                ask_p: t.ltp + 0.05,
            }],
        }),
        option_greeks: Some(OptionGreeks {
            delta: t.delta,
            theta: -6.0,
            gamma: t.gamma,
            vega: 12.0,
            rho: 0.4,
        }),
        vtt: t.vtt,
        oi: t.oi,
        iv: t.iv,
        tbq: 2_000.0,
        tsq: 1_000.0,
        ..Default::default()
    }))
}

fn index_feed(ltp: f64) -> Feed {
    full_feed(full_feed::Body::IndexFf(IndexFullFeed {
        ltpc: Some(Ltpc {
            ltp,
            ltt: 1_714_968_000_000,
            ltq: 0,
            cp: 22_400.0,
        }),
        market_ohlc: None,
    }))
}

fn frame(feeds: Vec<(&str, Feed)>) -> Vec<u8> {
    FeedResponse {
        r#type: 1,
        feeds: feeds.into_iter().map(|(k, f)| (k.to_string(), f)).collect::<HashMap<_, _>>(),
        current_ts: 1_714_968_000_000,
    }
    .encode_to_vec()
}

struct Pipeline {
    clock: Arc<ManualClock>,
    feed: FeedClient,
    _handle: FeedHandle,
    bus: EventBus,
}

fn pipeline() -> (Pipeline, Arc<MarketStore>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MarketStore::with_clock(clock.clone()));
    let (feed, handle) = FeedClient::new(FeedConfig::default(), "token".to_string(), store.clone());
    handle.register_alias(CE_KEY, "22500_CE");
    (
        Pipeline {
            clock,
            feed,
            _handle: handle,
            bus: EventBus::new(64),
        },
        store,
    )
}

impl Pipeline {
    async fn deliver_at(&self, offset_secs: i64, feeds: Vec<(&str, Feed)>) -> usize {
        self.clock.set(t0() + ChronoDuration::seconds(offset_secs));
        self.feed.on_frame(&frame(feeds)).await.unwrap()
    }

    fn generator(&self, store: Arc<MarketStore>, repo: Arc<dyn SignalRepository>) -> SignalGenerator {
        SignalGenerator::new(
            store,
            Arc::new(self.bus.clone()),
            repo,
            self.clock.clone(),
            SignalsConfig::default(),
        )
    }
}

fn cycle_time() -> DateTime<Utc> {
    t0() + ChronoDuration::seconds(60)
}

/// Panic short covering on the option, index ticking alongside
#[tokio::test]
async fn test_feed_frames_to_panic_signal() {
    let (p, store) = pipeline();
    let repo = InMemorySignalRepository::new();
    let generator = p.generator(store.clone(), Arc::new(repo.clone()));
    let mut rx = p.bus.subscribe();

    let written = p
        .deliver_at(
            2,
            vec![
                (CE_KEY, option_feed(OptionTick::default())),
                ("NSE_INDEX|Nifty 50", index_feed(22_505.0)),
            ],
        )
        .await;
    assert_eq!(written, 2);
    p.deliver_at(
        45,
        vec![(
            CE_KEY,
            option_feed(OptionTick {
                ltp: 102.0,
                oi: 4_000.0,
                vtt: 4_000,
                ..OptionTick::default()
            }),
        )],
    )
    .await;
    assert_eq!(store.stream_len("stream:22500_CE"), 2);
    assert_eq!(store.stream_len("stream:NIFTY_50"), 1);

    let report = generator.run_cycle(cycle_time()).await;
    assert_eq!(report.processed, 2);
    assert_eq!(report.alerts, 1);

    // Streams are processed in key order; "2" sorts before "N"
    let first: SignalEnvelope = serde_json::from_str(&rx.recv().await.unwrap().payload).unwrap();
    let second: SignalEnvelope = serde_json::from_str(&rx.recv().await.unwrap().payload).unwrap();
    assert_eq!(first.instrument_key, "22500_CE");
    assert_eq!(second.instrument_key, "NIFTY_50");

    match first.payload {
        SignalPayload::Pattern(pattern) => {
            assert_eq!(pattern.pattern, Pattern::PanicShortCovering);
            assert_eq!(pattern.signal, PatternSignal::PanicBuy);
            assert!(pattern.is_panic);
            assert_eq!(pattern.oi_change, -6_000);
            assert_eq!(pattern.volume_change, 3_000);
        }
        other => panic!("unexpected payload: {:?}", other),
    }

    assert_eq!(repo.count("panic_signals"), 1);
    let rows = repo.rows_for("22500_CE");
    let whale = rows
        .iter()
        .find_map(|e| match &e.payload {
            SignalPayload::Whale(w) => Some(w.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(whale.whale_type, WhaleType::MediumWhale);
    assert_eq!(whale.alert_type, AlertType::OiDrop);
    assert_eq!(whale.signal, WhaleSignal::Bearish);

    // pattern +10, panic +30, imbalance 0.333 * 50, flat greeks, whale -15
    let sentiment = latest_sentiment(&rows).unwrap();
    assert_eq!(sentiment.components.panic_score, 30.0);
    assert_eq!(sentiment.components.whale_score, -15.0);
    assert_eq!(sentiment.sentiment, SentimentLabel::Bullish);
    assert_eq!(sentiment.support_resistance.current_price, 102.0);
}

#[tokio::test]
async fn test_greeks_momentum_through_feed() {
    let (p, store) = pipeline();
    let repo = InMemorySignalRepository::new();
    let generator = p.generator(store, Arc::new(repo.clone()));

    p.deliver_at(0, vec![(CE_KEY, option_feed(OptionTick::default()))]).await;
    p.deliver_at(
        59,
        vec![(
            CE_KEY,
            option_feed(OptionTick {
                delta: 0.62,
                gamma: 0.022,
                iv: 20.06,
                ..OptionTick::default()
            }),
        )],
    )
    .await;

    generator.run_cycle(cycle_time()).await;

    let greeks = repo
        .rows_for("22500_CE")
        .into_iter()
        .find_map(|e| match e.payload {
            SignalPayload::Greeks(g) => Some(g),
            _ => None,
        })
        .unwrap();
    assert!(greeks.momentum_score >= 80.0);
    assert_eq!(greeks.momentum_type, MomentumType::ExplosiveBullish);
    assert_eq!(greeks.signal, MomentumSignal::StrongBuy);
}

#[tokio::test]
async fn test_bid_wall_from_depth() {
    let (p, store) = pipeline();
    let repo = InMemorySignalRepository::new();
    let generator = p.generator(store, Arc::new(repo.clone()));

    p.deliver_at(10, vec![(CE_KEY, option_feed(OptionTick::default()))]).await;
    p.deliver_at(
        20,
        vec![(
            CE_KEY,
            option_feed(OptionTick {
                bid_q: 75_000,
                ..OptionTick::default()
            }),
        )],
    )
    .await;

    let report = generator.run_cycle(cycle_time()).await;
    assert_eq!(report.alerts, 1);
    let rows = repo.rows_for("22500_CE");
    let alert = rows
        .iter()
        .find_map(|e| match &e.payload {
            SignalPayload::Whale(w) => Some(w),
            _ => None,
        })
        .unwrap();
    assert_eq!(alert.alert_type, AlertType::BidWall);
    assert_eq!(alert.signal, WhaleSignal::BullishSupport);
    assert_eq!(alert.alert_value, 75_000.0);
}

#[tokio::test]
async fn test_retention_and_window_boundaries() {
    let (p, store) = pipeline();
    let repo = InMemorySignalRepository::new();
    let generator = p.generator(store.clone(), Arc::new(repo.clone()));

    p.deliver_at(0, vec![(CE_KEY, option_feed(OptionTick::default()))]).await;
    // Exactly at the window end: belongs to the next cycle
    p.deliver_at(60, vec![(CE_KEY, option_feed(OptionTick::default()))]).await;

    generator.run_cycle(cycle_time()).await;
    let first = repo.rows_for("22500_CE");
    match &first[0].payload {
        SignalPayload::Pattern(pattern) => assert_eq!(pattern.pattern, Pattern::InsufficientData),
        other => panic!("unexpected payload: {:?}", other),
    }

    // 200s later the first two ticks have aged out of retention
    p.deliver_at(200, vec![(CE_KEY, option_feed(OptionTick::default()))]).await;
    assert_eq!(store.stream_len("stream:22500_CE"), 1);

    // Nothing in [t0+60, t0+120) any more
    let report = generator.run_cycle(t0() + ChronoDuration::seconds(120)).await;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn test_sqlite_history_feeds_sentiment() {
    let (p, store) = pipeline();
    let repo = Arc::new(SqliteSignalRepository::connect("sqlite::memory:").await.unwrap());
    let generator = p.generator(store, repo.clone());

    p.deliver_at(5, vec![(CE_KEY, option_feed(OptionTick::default()))]).await;
    p.deliver_at(
        50,
        vec![(
            CE_KEY,
            option_feed(OptionTick {
                ltp: 102.0,
                oi: 4_000.0,
                vtt: 4_000,
                ..OptionTick::default()
            }),
        )],
    )
    .await;
    let report = generator.run_cycle(cycle_time()).await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let recent = repo.query_recent("22500_CE", 10).await.unwrap();
    assert_eq!(recent.patterns.len(), 1);
    assert_eq!(recent.panics.len(), 1);
    assert_eq!(recent.imbalances.len(), 1);
    assert_eq!(recent.greeks.len(), 1);
    assert_eq!(recent.whales.len(), 1);
    assert_eq!(recent.patterns[0].timestamp, cycle_time());
    assert_eq!(recent.panics[0].value.signal, PatternSignal::PanicBuy);
}

#[tokio::test]
async fn test_undecodable_frame_leaves_store_untouched() {
    let (p, store) = pipeline();
    assert!(p.feed.on_frame(&[0xff, 0xff, 0xff]).await.is_err());
    assert_eq!(store.stream_len("stream:22500_CE"), 0);

    // Still accepts the next good frame
    assert_eq!(
        p.deliver_at(1, vec![(CE_KEY, option_feed(OptionTick::default()))]).await,
        1
    );
}

// ============= Live connection =============

const WAIT: Duration = Duration::from_secs(5);

type Upstream = WebSocketStream<TcpStream>;

/// Answers every authorize request with the local stream url.
async fn serve_authorize(listener: TcpListener, stream_url: String) {
    let body = serde_json::json!({
        "status": "success",
        "data": {"authorized_redirect_uri": stream_url}
    })
    .to_string();

    while let Ok((mut socket, _)) = listener.accept().await {
        let body = body.clone();
        tokio::spawn(async move {
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&chunk[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}

/// Local authorize endpoint plus a websocket server handing every accepted
/// connection to the test.
async fn local_upstream() -> (FeedConfig, mpsc::UnboundedReceiver<Upstream>) {
    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stream_url = format!("ws://{}/feed", ws_listener.local_addr().unwrap());
    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let authorize_url = format!("http://{}/authorize", http_listener.local_addr().unwrap());
    tokio::spawn(serve_authorize(http_listener, stream_url));

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((socket, _)) = ws_listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(socket).await {
                if tx.send(ws).is_err() {
                    return;
                }
            }
        }
    });

    let config = FeedConfig {
        authorize_url,
        reconnect_delay_secs: 1,
        connect_timeout_secs: 2,
        ..FeedConfig::default()
    };
    (config, rx)
}

async fn next_connection(connections: &mut mpsc::UnboundedReceiver<Upstream>) -> Upstream {
    timeout(WAIT, connections.recv()).await.unwrap().unwrap()
}

async fn next_control(ws: &mut Upstream) -> ControlFrame {
    loop {
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let WsMessage::Binary(bytes) = msg {
            return serde_json::from_slice(&bytes).unwrap();
        }
    }
}

async fn wait_for_state(handle: &FeedHandle, state: FeedState) {
    let mut states = handle.watch_state();
    timeout(WAIT, states.wait_for(|s| *s == state)).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_feed_client_reconnects_and_replays_subscriptions() {
    let (config, mut connections) = local_upstream().await;
    let store = Arc::new(MarketStore::new());
    let (client, handle) = FeedClient::new(config, "token".to_string(), store.clone());
    assert_eq!(handle.state(), FeedState::Disconnected);
    let task = tokio::spawn(client.run());

    // First connection: index on connect, then the option set
    let mut first = next_connection(&mut connections).await;
    let index_sub = next_control(&mut first).await;
    assert_eq!(index_sub.method, "sub");
    assert_eq!(index_sub.data.mode, "full");
    assert_eq!(index_sub.data.instrument_keys, vec!["NSE_INDEX|Nifty 50".to_string()]);
    wait_for_state(&handle, FeedState::Streaming).await;

    let options: BTreeSet<String> = ["NSE_FO|1", "NSE_FO|2"].iter().map(|s| s.to_string()).collect();
    let update = tokio::spawn({
        let handle = handle.clone();
        let options = options.clone();
        async move { handle.update_subscriptions(options).await }
    });
    let option_sub = next_control(&mut first).await;
    assert_eq!(option_sub.data.mode, "full_d30");
    assert_eq!(option_sub.data.instrument_keys, vec!["NSE_FO|1".to_string(), "NSE_FO|2".to_string()]);
    assert!(update.await.unwrap().is_ok());

    // Upstream drops the socket
    drop(first);
    wait_for_state(&handle, FeedState::Disconnected).await;
    let dropped_at = Instant::now();

    // Second connection after the reconnect delay replays everything
    let mut second = next_connection(&mut connections).await;
    assert!(dropped_at.elapsed() >= Duration::from_millis(900));
    let index_again = next_control(&mut second).await;
    assert_eq!(index_again.data.instrument_keys, vec!["NSE_INDEX|Nifty 50".to_string()]);
    let replay = next_control(&mut second).await;
    assert_eq!(replay.method, "sub");
    assert_eq!(replay.data.instrument_keys, vec!["NSE_FO|1".to_string(), "NSE_FO|2".to_string()]);
    assert_ne!(replay.guid, option_sub.guid);
    wait_for_state(&handle, FeedState::Streaming).await;

    // Frames on the new connection reach the store
    second
        .send(WsMessage::Binary(frame(vec![("NSE_INDEX|Nifty 50", index_feed(22_500.0))])))
        .await
        .unwrap();
    timeout(WAIT, async {
        while store.stream_len("stream:NIFTY_50") == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    handle.stop();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(handle.state(), FeedState::Disconnected);
}

#[tokio::test]
async fn test_feed_client_drops_silent_upstream() {
    let (mut config, mut connections) = local_upstream().await;
    config.read_timeout_secs = 1;
    let (client, handle) = FeedClient::new(config, "token".to_string(), Arc::new(MarketStore::new()));
    let task = tokio::spawn(client.run());

    let mut first = next_connection(&mut connections).await;
    next_control(&mut first).await;
    wait_for_state(&handle, FeedState::Streaming).await;

    // Socket stays open but nothing arrives
    wait_for_state(&handle, FeedState::Disconnected).await;
    let mut second = next_connection(&mut connections).await;
    let index_sub = next_control(&mut second).await;
    assert_eq!(index_sub.data.instrument_keys, vec!["NSE_INDEX|Nifty 50".to_string()]);

    handle.stop();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(handle.state(), FeedState::Disconnected);
    drop(first);
}
