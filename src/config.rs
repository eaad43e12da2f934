use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::analytics::PatternThresholds;
use crate::constants::{feed, instruments, signals, store};
use crate::error::ConfigError;

pub const ACCESS_TOKEN_ENV: &str = "UPSTOX_ACCESS_TOKEN";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub authorize_url: String,
    pub index_key: String,
    pub index_alias: String,
    pub index_mode: String,
    pub option_mode: String,
    pub reconnect_delay_secs: u64,
    pub connect_timeout_secs: u64,
    /// Reconnect when upstream stays silent this long
    pub read_timeout_secs: u64,
    pub retention_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            authorize_url: feed::AUTHORIZE_URL.to_string(),
            index_key: feed::INDEX_KEY.to_string(),
            index_alias: feed::INDEX_ALIAS.to_string(),
            index_mode: feed::INDEX_MODE.to_string(),
            option_mode: feed::OPTION_MODE.to_string(),
            reconnect_delay_secs: feed::RECONNECT_DELAY.as_secs(),
            connect_timeout_secs: feed::CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: feed::READ_TIMEOUT.as_secs(),
            retention_secs: feed::DATA_RETENTION.as_secs(),
        }
    }
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InstrumentsConfig {
    pub option_chain_url: String,
    /// `YYYY-MM-DD`; nearest weekly expiry when unset
    pub expiry: Option<String>,
    /// Seeds the first subscription before the index has ticked
    pub center_strike: Option<i64>,
    pub strike_step: i64,
    pub strikes_each_side: usize,
    pub refresh_interval_secs: u64,
}

impl Default for InstrumentsConfig {
    fn default() -> Self {
        Self {
            option_chain_url: instruments::OPTION_CHAIN_URL.to_string(),
            expiry: None,
            center_strike: None,
            strike_step: instruments::DEFAULT_STRIKE_STEP,
            strikes_each_side: instruments::DEFAULT_STRIKES_EACH_SIDE,
            refresh_interval_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    pub window_secs: i64,
    pub history_limit: usize,
    pub max_concurrent_instruments: usize,
    pub pattern: PatternThresholds,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            window_secs: signals::WINDOW_SECS,
            history_limit: signals::HISTORY_LIMIT,
            max_concurrent_instruments: 1,
            pattern: PatternThresholds::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// e.g. `sqlite://data/signals.db`; in-memory history when unset
    pub database_url: Option<String>,
    pub bus_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bus_capacity: store::DEFAULT_BUS_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub instruments: InstrumentsConfig,
    pub signals: SignalsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 8] = [
            ("signals.window_secs", self.signals.window_secs > 0),
            ("signals.max_concurrent_instruments", self.signals.max_concurrent_instruments > 0),
            ("feed.reconnect_delay_secs", self.feed.reconnect_delay_secs > 0),
            ("feed.connect_timeout_secs", self.feed.connect_timeout_secs > 0),
            ("feed.read_timeout_secs", self.feed.read_timeout_secs > 0),
            ("feed.retention_secs", self.feed.retention_secs > 0),
            ("instruments.strike_step", self.instruments.strike_step > 0),
            ("storage.bus_capacity", self.storage.bus_capacity > 0),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Bearer token for the upstream REST and stream endpoints.
pub fn access_token() -> Result<String, ConfigError> {
    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ConfigError::MissingCredential(ACCESS_TOKEN_ENV)),
    }
}
