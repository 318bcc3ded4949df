//! Configuration Module
//!
//! Handles loading and managing relay configuration from environment variables.
//! Durations that describe cache lifetimes are given in minutes, everything
//! else in the unit named by the variable.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Settings for one domain cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// TTL in minutes applied when a caller does not supply one
    pub default_ttl_minutes: u64,
    /// Maximum number of entries held at once
    pub max_entries: usize,
}

impl StoreConfig {
    pub const fn new(default_ttl_minutes: u64, max_entries: usize) -> Self {
        Self {
            default_ttl_minutes,
            max_entries,
        }
    }

    /// Default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        crate::cache::ttl_minutes(self.default_ttl_minutes)
    }

    fn from_env(prefix: &str, fallback: StoreConfig) -> Self {
        Self {
            default_ttl_minutes: env_or(
                &format!("{prefix}_TTL_MINUTES"),
                fallback.default_ttl_minutes,
            ),
            max_entries: env_or(&format!("{prefix}_MAX_ENTRIES"), fallback.max_entries),
        }
    }
}

/// Relay configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Base URL of the finance backend tunnel
    pub backend_url: String,
    /// Base URL of the Naver open API
    pub naver_base_url: String,
    pub naver_client_id: String,
    pub naver_client_secret: String,
    /// Upstream calls admitted per rolling minute
    pub max_requests_per_minute: usize,
    /// Debounce delay in milliseconds
    pub debounce_delay_ms: u64,
    /// Batch accumulation window in milliseconds
    pub batch_delay_ms: u64,
    /// Number of batched requests run concurrently per chunk
    pub batch_chunk_size: usize,
    /// Background sweep interval in seconds
    pub sweep_interval_secs: u64,
    /// Market data (price series) store
    pub market: StoreConfig,
    /// News search store
    pub news: StoreConfig,
    /// Stock listing store
    pub listing: StoreConfig,
    /// Analysis and ranking store
    pub analysis: StoreConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `BACKEND_URL` - finance backend base URL (default: http://localhost:8250)
    /// - `NAVER_BASE_URL`, `NAVER_CLIENT_ID`, `NAVER_CLIENT_SECRET`
    /// - `MAX_REQUESTS_PER_MINUTE` - limiter budget (default: 40)
    /// - `DEBOUNCE_DELAY_MS` (default: 300), `BATCH_DELAY_MS` (default: 100)
    /// - `BATCH_CHUNK_SIZE` (default: 5), `SWEEP_INTERVAL_SECS` (default: 300)
    /// - `{MARKET,NEWS,LISTING,ANALYSIS}_MAX_ENTRIES`
    /// - `{MARKET,NEWS,LISTING,ANALYSIS}_TTL_MINUTES` - lifetime of entries
    ///   whose operation does not fix its own (stock data, stock listings,
    ///   predictions and news searches)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            naver_base_url: env::var("NAVER_BASE_URL").unwrap_or(defaults.naver_base_url),
            naver_client_id: env::var("NAVER_CLIENT_ID").unwrap_or_default(),
            naver_client_secret: env::var("NAVER_CLIENT_SECRET").unwrap_or_default(),
            max_requests_per_minute: env_or(
                "MAX_REQUESTS_PER_MINUTE",
                defaults.max_requests_per_minute,
            ),
            debounce_delay_ms: env_or("DEBOUNCE_DELAY_MS", defaults.debounce_delay_ms),
            batch_delay_ms: env_or("BATCH_DELAY_MS", defaults.batch_delay_ms),
            batch_chunk_size: env_or("BATCH_CHUNK_SIZE", defaults.batch_chunk_size),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            market: StoreConfig::from_env("MARKET", defaults.market),
            news: StoreConfig::from_env("NEWS", defaults.news),
            listing: StoreConfig::from_env("LISTING", defaults.listing),
            analysis: StoreConfig::from_env("ANALYSIS", defaults.analysis),
        };

        if config.naver_client_id.is_empty() || config.naver_client_secret.is_empty() {
            warn!("NAVER_CLIENT_ID or NAVER_CLIENT_SECRET is not set, news search will be rejected upstream");
        }

        config
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            backend_url: "http://localhost:8250".to_string(),
            naver_base_url: "https://openapi.naver.com".to_string(),
            naver_client_id: String::new(),
            naver_client_secret: String::new(),
            max_requests_per_minute: 40,
            debounce_delay_ms: 300,
            batch_delay_ms: 100,
            batch_chunk_size: 5,
            sweep_interval_secs: 300,
            market: StoreConfig::new(60, 50),
            news: StoreConfig::new(30, 100),
            listing: StoreConfig::new(240, 20),
            analysis: StoreConfig::new(120, 30),
        }
    }
}

fn env_or<T: FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
