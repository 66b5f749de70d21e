//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

use eventfeed_feed::{BasePath, CacheSettings, FeedError, PageSize};

use crate::FeedOptions;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Feed protocol settings.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "eventfeed_feed=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Feed protocol configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Path the feed is mounted at.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Events per page. Changing this re-slices every page, so it is fixed
    /// for the life of a deployment.
    #[serde(default = "default_events_per_page")]
    pub events_per_page: u64,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Read cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of a complete page, in milliseconds.
    #[serde(default = "default_complete_page_ttl_ms")]
    pub complete_page_ttl_ms: u64,

    /// Lifetime of the tail page and the event count, in milliseconds.
    #[serde(default = "default_incomplete_page_ttl_ms")]
    pub incomplete_page_ttl_ms: u64,

    /// Seconds between sweeps of expired cache entries.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "eventfeed.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_path() -> String {
    BasePath::DEFAULT.to_string()
}

fn default_events_per_page() -> u64 {
    PageSize::DEFAULT.get()
}

fn default_true() -> bool {
    true
}

fn default_complete_page_ttl_ms() -> u64 {
    300_000
}

fn default_incomplete_page_ttl_ms() -> u64 {
    1_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            events_per_page: default_events_per_page(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            complete_page_ttl_ms: default_complete_page_ttl_ms(),
            incomplete_page_ttl_ms: default_incomplete_page_ttl_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            complete_page_ttl: Duration::from_millis(self.complete_page_ttl_ms),
            incomplete_page_ttl: Duration::from_millis(self.incomplete_page_ttl_ms),
        }
    }
}

impl FeedConfig {
    /// Validates the feed section and turns it into [`FeedOptions`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Feed` for a zero page size or a bad base path,
    /// and `ConfigError::Invalid` for zero TTLs.
    pub fn options(&self) -> Result<FeedOptions, ConfigError> {
        let base_path = BasePath::new(&self.base_path)?;
        let page_size = PageSize::new(self.events_per_page)?;

        if self.cache.complete_page_ttl_ms == 0 || self.cache.incomplete_page_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "feed.cache TTLs must be greater than zero".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "feed.cache.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(FeedOptions {
            base_path,
            page_size,
            cache: self.cache.enabled.then(|| self.cache.settings()),
            max_age: self.cache.settings(),
        })
    }
}

impl Config {
    /// Checks every section that can be wrong at startup.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<FeedOptions, ConfigError> {
        if self.database.pool_max_size == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_max_size must be at least 1".to_string(),
            ));
        }
        self.feed.options()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The feed section names an invalid base path or page size.
    #[error("invalid feed configuration: {0}")]
    Feed(#[from] FeedError),

    /// Any other out-of-range setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EVENTFEED_HOST` overrides `server.host`
/// - `EVENTFEED_PORT` overrides `server.port`
/// - `EVENTFEED_DB_PATH` overrides `database.path`
/// - `EVENTFEED_DB_BUSY_TIMEOUT_MS` overrides `database.busy_timeout_ms`
/// - `EVENTFEED_DB_POOL_MAX_SIZE` overrides `database.pool_max_size`
/// - `EVENTFEED_LOG_LEVEL` overrides `logging.level`
/// - `EVENTFEED_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `EVENTFEED_BASE_PATH` overrides `feed.base_path`
/// - `EVENTFEED_EVENTS_PER_PAGE` overrides `feed.events_per_page`
/// - `EVENTFEED_CACHE_ENABLED` overrides `feed.cache.enabled`
/// - `EVENTFEED_CACHE_COMPLETE_TTL_MS` overrides `feed.cache.complete_page_ttl_ms`
/// - `EVENTFEED_CACHE_INCOMPLETE_TTL_MS` overrides `feed.cache.incomplete_page_ttl_ms`
/// - `EVENTFEED_CACHE_SWEEP_INTERVAL_SECS` overrides `feed.cache.sweep_interval_secs`
///
/// Unparseable numeric overrides are ignored.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Like [`load_config`], with overrides read through `lookup` instead of the
/// process environment.
pub fn load_config_with(
    path: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    fn set_parsed<T: std::str::FromStr>(target: &mut T, value: Option<String>) {
        if let Some(parsed) = value.and_then(|v| v.trim().parse().ok()) {
            *target = parsed;
        }
    }

    set_parsed(&mut config.server.host, lookup("EVENTFEED_HOST"));
    set_parsed(&mut config.server.port, lookup("EVENTFEED_PORT"));
    if let Some(db_path) = lookup("EVENTFEED_DB_PATH") {
        config.database.path = db_path;
    }
    set_parsed(
        &mut config.database.busy_timeout_ms,
        lookup("EVENTFEED_DB_BUSY_TIMEOUT_MS"),
    );
    set_parsed(
        &mut config.database.pool_max_size,
        lookup("EVENTFEED_DB_POOL_MAX_SIZE"),
    );
    if let Some(level) = lookup("EVENTFEED_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("EVENTFEED_LOG_JSON") {
        config.logging.json = parse_bool(&json);
    }
    if let Some(base_path) = lookup("EVENTFEED_BASE_PATH") {
        config.feed.base_path = base_path;
    }
    set_parsed(
        &mut config.feed.events_per_page,
        lookup("EVENTFEED_EVENTS_PER_PAGE"),
    );
    if let Some(enabled) = lookup("EVENTFEED_CACHE_ENABLED") {
        config.feed.cache.enabled = parse_bool(&enabled);
    }
    set_parsed(
        &mut config.feed.cache.complete_page_ttl_ms,
        lookup("EVENTFEED_CACHE_COMPLETE_TTL_MS"),
    );
    set_parsed(
        &mut config.feed.cache.incomplete_page_ttl_ms,
        lookup("EVENTFEED_CACHE_INCOMPLETE_TTL_MS"),
    );
    set_parsed(
        &mut config.feed.cache.sweep_interval_secs,
        lookup("EVENTFEED_CACHE_SWEEP_INTERVAL_SECS"),
    );
}
