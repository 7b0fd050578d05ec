use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::location::{Endpoints, LocationMode};
use crate::retry::{RetryPolicy, DEFAULT_RETRYABLE_STATUSES};

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Add random jitter in [0, base delay) to each backoff.
    #[serde(default = "default_true")]
    pub jitter: bool,
    /// HTTP statuses that are retried.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
    /// Give up once an operation has been retrying this long.
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_retryable_statuses() -> Vec<u16> {
    DEFAULT_RETRYABLE_STATUSES.to_vec()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
            jitter: true,
            retryable_statuses: default_retryable_statuses(),
            max_elapsed_secs: None,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        // Negative or NaN delays fall back to no base delay.
        let base = Duration::try_from_secs_f64(self.base_delay_secs).unwrap_or(Duration::ZERO);
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(base)
            .with_max_delay(Duration::from_secs(self.max_delay_secs))
            .with_jitter(self.jitter)
            .with_retryable_statuses(self.retryable_statuses.iter().copied())
            .with_max_elapsed(self.max_elapsed_secs.map(Duration::from_secs))
    }
}

/// Global configuration loaded from `~/.config/cirrus/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirrusConfig {
    /// Base URI of the primary endpoint.
    pub primary_endpoint: String,
    /// Base URI of the read-only secondary endpoint, if the account has one.
    #[serde(default)]
    pub secondary_endpoint: Option<String>,
    /// "primary-only", "primary-then-secondary", "secondary-then-primary" or "secondary-only".
    #[serde(default)]
    pub location_mode: LocationMode,
    /// Timeout for each attempt in seconds.
    pub attempt_timeout_secs: u64,
    /// Optional deadline for a whole CLI operation in seconds.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    /// Wait between long-running job status calls in milliseconds.
    pub poll_interval_ms: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for CirrusConfig {
    fn default() -> Self {
        Self {
            primary_endpoint: "http://127.0.0.1:10000/".to_string(),
            secondary_endpoint: None,
            location_mode: LocationMode::PrimaryOnly,
            attempt_timeout_secs: 30,
            operation_timeout_secs: None,
            poll_interval_ms: 1000,
            retry: None,
        }
    }
}

impl CirrusConfig {
    pub fn endpoints(&self) -> crate::Result<Endpoints> {
        Endpoints::parse(&self.primary_endpoint, self.secondary_endpoint.as_deref())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cirrus")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CirrusConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CirrusConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path; the file must exist.
pub fn load_from(path: &Path) -> Result<CirrusConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: CirrusConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
