use rust_whalehunter::bus::EventBus;
use rust_whalehunter::clock::{Clock, SystemClock};
use rust_whalehunter::config::{access_token, AppConfig};
use rust_whalehunter::data::{InMemorySignalRepository, MarketStore, SignalRepository, SqliteSignalRepository};
use rust_whalehunter::exchange::{FeedClient, OptionChainClient};
use rust_whalehunter::services::{SignalGenerator, StrikeTracker};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_ENV: &str = "WHALEHUNTER_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Load Configuration
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.yaml".to_string());
    let config = if Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        AppConfig::default()
    };

    // Setup Logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🐋 Starting Whale Hunter...");
    info!("Loaded Configuration: {:?}", config);

    let token = access_token()?;

    // Shared state
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MarketStore::with_clock(clock.clone()));
    let bus = EventBus::new(config.storage.bus_capacity);
    let repository: Arc<dyn SignalRepository> = match &config.storage.database_url {
        Some(url) => {
            if let Some(parent) = url
                .strip_prefix("sqlite://")
                .and_then(|p| Path::new(p).parent())
                .filter(|p| !p.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteSignalRepository::connect(url).await?)
        }
        None => {
            warn!("⚠️ storage.database_url not set - signal history kept in memory only");
            Arc::new(InMemorySignalRepository::new())
        }
    };

    // Feed client
    let (feed, feed_handle) = FeedClient::new(config.feed.clone(), token.clone(), store.clone());
    let feed_task = tokio::spawn(feed.run());

    // Strike tracker
    let chain = OptionChainClient::new(token, &config.instruments, &config.feed);
    let tracker = StrikeTracker::new(
        store.clone(),
        Arc::new(chain),
        Arc::new(feed_handle.clone()),
        clock.clone(),
        config.instruments.clone(),
        config.feed.index_alias.clone(),
    );
    let tracker_stop = tracker.stop_flag();
    let tracker_task = tokio::spawn(tracker.run());

    // Cycle orchestrator
    let generator = SignalGenerator::new(store, Arc::new(bus), repository.clone(), clock, config.signals.clone());
    let generator_stop = generator.stop_flag();
    let generator_task = tokio::spawn(async move { generator.run().await });

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutdown requested");

    feed_handle.stop();
    tracker_stop.store(true, Ordering::SeqCst);
    generator_stop.store(true, Ordering::SeqCst);

    let _ = generator_task.await;
    // The tracker may be mid-sleep; don't wait out its interval.
    tracker_task.abort();
    let _ = feed_task.await;
    repository.close().await;

    info!("👋 Whale Hunter stopped");
    Ok(())
}
