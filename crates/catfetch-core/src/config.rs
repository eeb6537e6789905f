use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per identifier (including the first).
    pub max_attempts: u32,
    /// Delay in seconds after an HTTP 429 before trying again.
    pub throttle_delay_secs: f64,
    /// Delay in seconds after a request timeout (0 = retry immediately).
    #[serde(default)]
    pub timeout_delay_secs: f64,
    /// Growth factor applied per retry; 1.0 keeps the delay fixed.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on any single backoff delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            throttle_delay_secs: 10.0,
            timeout_delay_secs: 0.0,
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    /// Out-of-range delays (rejected by `validate`) fall back to `max_delay_secs`.
    pub fn to_policy(&self) -> RetryPolicy {
        let max_delay = Duration::from_secs(self.max_delay_secs);
        RetryPolicy {
            max_attempts: self.max_attempts,
            throttle_delay: delay(self.throttle_delay_secs).unwrap_or(max_delay),
            timeout_delay: delay(self.timeout_delay_secs).unwrap_or(max_delay),
            backoff_multiplier: self.backoff_multiplier,
            max_delay,
        }
    }
}

/// Seconds to a `Duration`; `None` for negative, NaN, infinite or overflowing values.
fn delay(secs: f64) -> Option<Duration> {
    if secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// How terminal failures are written to the failed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedLogMode {
    /// Every terminal failure is appended, so the log is a multiset across runs.
    #[default]
    Audit,
    /// An identifier is appended at most once over the lifetime of the log.
    Dedupe,
}

/// Invalid configuration value, reported before any fetching starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk_size must be at least 1")]
    ZeroChunkSize,
    #[error("max_concurrent_requests must be at least 1")]
    ZeroConcurrency,
    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("retry.backoff_multiplier must be a finite number >= 1.0 (got {0})")]
    ShrinkingBackoff(f64),
    #[error("retry.{field} must be a finite, non-negative number of seconds (got {value})")]
    BadDelay { field: &'static str, value: f64 },
    #[error("api_base_url is not a valid URL: {0}")]
    BadBaseUrl(#[from] url::ParseError),
}

/// Global configuration loaded from `~/.config/catfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatfetchConfig {
    /// Source list: one identifier per line.
    pub ids_file: PathBuf,
    /// Directory receiving one JSON batch file per chunk.
    pub output_dir: PathBuf,
    /// Append-only log of identifiers fetched successfully.
    pub processed_log: PathBuf,
    /// Append-only log of identifiers that ended in a terminal failure.
    pub failed_log: PathBuf,
    /// Catalog endpoint; the identifier is appended as the last path segment.
    pub api_base_url: String,
    /// Maximum fetches in flight at once.
    pub max_concurrent_requests: usize,
    /// Identifiers per chunk (and per batch file).
    pub chunk_size: usize,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Also exclude identifiers found in the failed log from the work set.
    #[serde(default)]
    pub skip_failed: bool,
    #[serde(default)]
    pub failed_log_mode: FailedLogMode,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for CatfetchConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), "Mozilla/5.0".to_string());
        Self {
            ids_file: PathBuf::from("product_ids.txt"),
            output_dir: PathBuf::from("output_files"),
            processed_log: PathBuf::from("processed_ids.log"),
            failed_log: PathBuf::from("failed_products.log"),
            api_base_url: "https://api.tiki.vn/product-detail/api/v1/products/".to_string(),
            max_concurrent_requests: 50,
            chunk_size: 1000,
            request_timeout_secs: 15,
            connect_timeout_secs: default_connect_timeout_secs(),
            skip_failed: false,
            failed_log_mode: FailedLogMode::Audit,
            headers,
            retry: None,
        }
    }
}

impl CatfetchConfig {
    /// Effective retry settings (the `[retry]` section or built-in defaults).
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check values that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let retry = self.retry_config();
        if retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !(retry.backoff_multiplier >= 1.0 && retry.backoff_multiplier.is_finite()) {
            return Err(ConfigError::ShrinkingBackoff(retry.backoff_multiplier));
        }
        for (field, value) in [
            ("throttle_delay_secs", retry.throttle_delay_secs),
            ("timeout_delay_secs", retry.timeout_delay_secs),
        ] {
            if delay(value).is_none() {
                return Err(ConfigError::BadDelay { field, value });
            }
        }
        url::Url::parse(&self.api_base_url)?;
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("catfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CatfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CatfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file, which must exist.
pub fn load_from_path(path: &Path) -> Result<CatfetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: CatfetchConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
