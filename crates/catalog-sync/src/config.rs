//! Configuration for the Remote Catalog Service connection.
//!
//! Values can be assembled with [`RemoteCatalogConfig::builder`] or loaded
//! from environment variables with [`RemoteCatalogConfig::from_env`]. Loading
//! is fail-fast: a required variable that is missing or malformed aborts with
//! a [`ConfigError`] naming the variable.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::throttle::ThrottleConfig;
use crate::SyncError;

/// Hard upper bound the Remote Catalog Service accepts for `limit`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Value sent in the `X-Version` header.
pub const DEFAULT_API_VERSION: &str = "1.0.0";

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

impl From<ConfigError> for SyncError {
    fn from(e: ConfigError) -> Self {
        SyncError::Config(e.to_string())
    }
}

/// Retry policy for remote requests (exponential backoff with jitter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds (default: 200).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds (default: 10000).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Jitter as a fraction of the delay (default: 0.25).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_jitter_factor() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Disable retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Short delays for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 5,
            max_backoff_ms: 20,
            jitter_factor: 0.0,
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    #[must_use]
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    /// Backoff before retry number `attempt`, with jitter applied.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base = self.base_backoff(attempt);
        if self.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let base_ms = base.as_millis() as f64;
        let jitter = rand::thread_rng().gen_range(0.0..=base_ms * self.jitter_factor);
        Duration::from_millis((base_ms + jitter) as u64)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err("max_backoff_ms must be >= initial_backoff_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err("jitter_factor must be in range [0.0, 1.0]".to_string());
        }
        Ok(())
    }
}

/// Connection settings for the Remote Catalog Service.
#[derive(Debug, Clone)]
pub struct RemoteCatalogConfig {
    /// Base URL, e.g. `https://api.example-pos.com`.
    pub base_url: String,
    /// Page size used by `fetch_all`, at most [`MAX_PAGE_SIZE`].
    pub page_size: u32,
    /// How many trailing pages may be in flight at once.
    pub max_concurrent_pages: usize,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Subtracted from the server-side token TTL.
    pub token_safety_margin: Duration,
    /// Value of the `X-Version` header.
    pub api_version: String,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
    /// Pacing of remote-mutating calls.
    pub throttle: ThrottleConfig,
}

impl Default for RemoteCatalogConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            page_size: MAX_PAGE_SIZE,
            max_concurrent_pages: 4,
            request_timeout: Duration::from_secs(30),
            token_safety_margin: Duration::from_secs(60),
            api_version: DEFAULT_API_VERSION.to_string(),
            retry: RetryConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl RemoteCatalogConfig {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> RemoteCatalogConfigBuilder {
        RemoteCatalogConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<(), SyncError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| SyncError::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(SyncError::Config(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::Config(format!(
                "page_size must be in 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.max_concurrent_pages == 0 {
            return Err(SyncError::Config(
                "max_concurrent_pages must be > 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Config("request_timeout must be > 0".to_string()));
        }
        self.retry.validate().map_err(SyncError::Config)?;
        Ok(())
    }

    /// Loads the configuration from process environment variables.
    ///
    /// | Variable | Required | Default |
    /// |---|---|---|
    /// | `CATALOG_REMOTE_URL` | yes | |
    /// | `CATALOG_PAGE_SIZE` | no | 100 |
    /// | `CATALOG_MAX_CONCURRENT_PAGES` | no | 4 |
    /// | `CATALOG_REQUEST_TIMEOUT_SECS` | no | 30 |
    /// | `CATALOG_MAX_RETRIES` | no | 3 |
    /// | `CATALOG_MUTATION_INTERVAL_MS` | no | 250 (0 disables) |
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("CATALOG_REMOTE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("CATALOG_REMOTE_URL".to_string()))?;

        let mut config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        };

        if let Some(v) = parse_var::<u32>(&lookup, "CATALOG_PAGE_SIZE")? {
            config.page_size = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "CATALOG_MAX_CONCURRENT_PAGES")? {
            config.max_concurrent_pages = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, "CATALOG_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u32>(&lookup, "CATALOG_MAX_RETRIES")? {
            config.retry.max_retries = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, "CATALOG_MUTATION_INTERVAL_MS")? {
            config.throttle = if v == 0 {
                ThrottleConfig::Disabled
            } else {
                ThrottleConfig::FixedInterval(Duration::from_millis(v))
            };
        }

        config
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                var: "CATALOG_*".to_string(),
                message: e.to_string(),
            })?;

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var: var.to_string(),
                message: e.to_string(),
            }),
    }
}

/// Builder for [`RemoteCatalogConfig`].
#[derive(Debug, Default)]
pub struct RemoteCatalogConfigBuilder {
    config: RemoteCatalogConfig,
}

impl RemoteCatalogConfigBuilder {
    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Sets the number of concurrently fetched pages.
    #[must_use]
    pub fn max_concurrent_pages(mut self, n: usize) -> Self {
        self.config.max_concurrent_pages = n;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the token safety margin.
    #[must_use]
    pub fn token_safety_margin(mut self, margin: Duration) -> Self {
        self.config.token_safety_margin = margin;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Sets the mutation throttle.
    #[must_use]
    pub fn throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.config.throttle = throttle;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if validation fails.
    pub fn build(self) -> Result<RemoteCatalogConfig, SyncError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
