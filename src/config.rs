//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::OddsApiError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Provider ===
    /// Odds API key. Optional at load time, required before any upstream call.
    #[serde(default)]
    pub the_odds_api_key: Option<String>,

    /// Odds API base URL.
    #[serde(default = "default_base_url")]
    pub odds_api_base_url: String,

    // === Fetch Client ===
    /// Default time-to-live for cached responses in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// HTTP client timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    // === Snapshots ===
    /// Directory that receives the snapshot log files.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Upstream calls in flight across the sport/event fan-out (1 = strictly sequential).
    #[serde(default = "default_concurrency")]
    pub snapshot_concurrency: usize,

    // === Server Configuration ===
    /// HTTP server port for the `serve` command.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_base_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}

fn default_cache_ttl_ms() -> u64 {
    10 * 60 * 1000 // 10 minutes
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    1
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            the_odds_api_key: None,
            odds_api_base_url: default_base_url(),
            cache_ttl_ms: default_cache_ttl_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            snapshot_dir: default_snapshot_dir(),
            snapshot_concurrency: default_concurrency(),
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.odds_api_base_url.trim().is_empty() {
            return Err("ODDS_API_BASE_URL must not be empty".to_string());
        }

        if self.cache_ttl_ms == 0 {
            return Err("CACHE_TTL_MS must be greater than 0".to_string());
        }

        if self.snapshot_concurrency == 0 {
            return Err("SNAPSHOT_CONCURRENCY must be at least 1".to_string());
        }

        Ok(())
    }

    /// Resolve the provider credential, failing before any network call.
    pub fn credential(&self) -> Result<String, OddsApiError> {
        self.the_odds_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or(OddsApiError::MissingCredential)
    }

    /// Default cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// HTTP timeout as a duration.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Tracing filter directive: debug for this crate when verbose, else `RUST_LOG`.
    pub fn log_directive(&self, verbose_flag: bool) -> String {
        if verbose_flag || self.verbose {
            "odds_snapshot=debug,info".to_string()
        } else {
            self.rust_log.clone()
        }
    }
}
