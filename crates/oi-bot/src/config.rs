//! Application configuration.
//!
//! Layers, lowest priority first:
//! 1. built-in defaults
//! 2. TOML file (optional)
//! 3. `OI_*` environment variables, `__` between sections
//!    (`OI_CACHE__HOST`, `OI_STREAMS=btcusdt@kline_5m,ethusdt@kline_5m`)

use crate::error::{AppError, AppResult};
use config::{Config, Environment, File, FileFormat};
use oi_cache::RedisSettings;
use oi_core::Symbol;
use oi_detector::DetectorConfig;
use oi_persistence::StoreSettings;
use oi_upstream::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Cache (Redis) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    /// Empty or absent means no AUTH.
    pub password: Option<String>,
    pub db: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "redis".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

impl From<&CacheConfig> for RedisSettings {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            password: cfg.password.clone(),
            db: cfg.db,
        }
    }
}

/// Relational store (MySQL / MariaDB) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "mariadb".to_string(),
            port: 3306,
            user: "myuser".to_string(),
            password: "mypass".to_string(),
            database: "open_interest_db".to_string(),
            max_connections: 5,
        }
    }
}

impl From<&StoreConfig> for StoreSettings {
    fn from(cfg: &StoreConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            user: cfg.user.clone(),
            password: cfg.password.clone(),
            database: cfg.database.clone(),
            max_connections: cfg.max_connections,
        }
    }
}

/// Exchange REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub historical_url: String,
    pub current_url: String,
    /// Historical bucket, e.g. "5m".
    pub period: String,
    pub request_timeout_ms: u64,
    /// Attempts per call, including the first.
    pub max_attempts: u32,
    /// Attempt `n` waits `n * retry_base_delay_ms` before the next.
    pub retry_base_delay_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            historical_url: client.historical_url,
            current_url: client.current_url,
            period: "5m".to_string(),
            request_timeout_ms: client.request_timeout.as_millis() as u64,
            max_attempts: client.max_attempts,
            retry_base_delay_ms: client.retry_base_delay.as_millis() as u64,
        }
    }
}

impl From<&UpstreamConfig> for ClientConfig {
    fn from(cfg: &UpstreamConfig) -> Self {
        Self {
            historical_url: cfg.historical_url.clone(),
            current_url: cfg.current_url.clone(),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
            max_attempts: cfg.max_attempts,
            retry_base_delay: Duration::from_millis(cfg.retry_base_delay_ms),
        }
    }
}

/// Historical poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalConfig {
    pub interval_secs: u64,
    /// Fetch only what is newer than the last stored timestamp.
    pub incremental: bool,
}

impl Default for HistoricalConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            incremental: false,
        }
    }
}

impl HistoricalConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Current poller and detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentConfig {
    pub interval_secs: u64,
    /// Extra window reads while the historical poller catches up.
    pub window_retry_attempts: u32,
    pub window_retry_delay_ms: u64,
}

impl Default for CurrentConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            window_retry_attempts: 3,
            window_retry_delay_ms: 3_000,
        }
    }
}

impl CurrentConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn window_retry_delay(&self) -> Duration {
        Duration::from_millis(self.window_retry_delay_ms)
    }
}

/// Startup connection retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    pub connect_attempts: u32,
    pub connect_delay_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 10,
            connect_delay_ms: 3_000,
        }
    }
}

impl StartupConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }
}

/// Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            metrics_port: 9100,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub upstream: UpstreamConfig,
    pub historical: HistoricalConfig,
    pub current: CurrentConfig,
    pub detector: DetectorConfig,
    pub startup: StartupConfig,
    pub telemetry: TelemetryConfig,
    /// Stream names, e.g. `btcusdt@kline_5m`. Symbols are derived from these.
    pub streams: Vec<String>,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Path resolution: `path` argument > `OI_CONFIG` env var > default path.
    /// A missing file is not an error; defaults and env vars still apply.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let config_path = path
            .map(str::to_string)
            .or_else(|| std::env::var("OI_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&config_path).exists() {
            warn!(path = %config_path, "Config file not found, using defaults and environment");
        }

        let settings = Config::builder()
            .add_source(File::new(&config_path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("OI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("streams"),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to load config: {e}")))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text, without env overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> AppResult<()> {
        if self.streams.is_empty() {
            return Err(AppError::Config("streams must not be empty".to_string()));
        }

        self.detector.validate()?;

        if self.historical.interval_secs == 0 || self.current.interval_secs == 0 {
            return Err(AppError::Config(
                "poll intervals must be positive".to_string(),
            ));
        }

        if self.upstream.max_attempts == 0 {
            return Err(AppError::Config(
                "upstream.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.startup.connect_attempts == 0 {
            return Err(AppError::Config(
                "startup.connect_attempts must be at least 1".to_string(),
            ));
        }

        for stream in &self.streams {
            Symbol::from_stream(stream)
                .map_err(|e| AppError::Config(format!("Bad stream {stream:?}: {e}")))?;
        }

        Ok(())
    }

    /// Symbols derived from the stream list, deduplicated, order kept.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            match Symbol::from_stream(stream) {
                Ok(symbol) if !symbols.contains(&symbol) => symbols.push(symbol),
                Ok(_) => {}
                Err(e) => warn!(stream = %stream, error = %e, "Skipping unparsable stream"),
            }
        }
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
streams = ["btcusdt@kline_5m", "ethusdt@kline_5m", "btcusdt@aggTrade"]

[cache]
host = "127.0.0.1"

[store]
database = "oi_test"

[current]
window_retry_delay_ms = 10

[detector]
deviation = "0.2"
"#;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.historical.interval_secs, 300);
        assert_eq!(config.current.interval_secs, 60);
        assert_eq!(config.current.window_retry_attempts, 3);
        assert_eq!(config.detector.window_size, 30);
        assert_eq!(config.startup.connect_attempts, 10);
        // No streams configured.
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.cache.host, "127.0.0.1");
        assert_eq!(config.cache.port, 6379);
        assert_eq!(config.store.database, "oi_test");
        assert_eq!(config.store.user, "myuser");
        assert_eq!(config.current.window_retry_delay(), Duration::from_millis(10));
        assert_eq!(config.detector.deviation, dec!(0.2));
        assert_eq!(config.detector.upper_ttl_secs, 300);
    }

    #[test]
    fn test_symbols_deduplicated_in_order() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        let symbols: Vec<String> = config
            .symbols()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_validate_rejects_bad_detector() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.detector.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_conversion() {
        let config = AppConfig::default();
        let client = ClientConfig::from(&config.upstream);
        assert_eq!(client.max_attempts, 3);
        assert_eq!(client.retry_base_delay, Duration::from_secs(1));
        assert!(client.current_url.ends_with("/fapi/v1/openInterest"));
    }
}
