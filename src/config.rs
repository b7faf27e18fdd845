//! Engine configuration
//!
//! Provides configuration for retry budgets, queue flush scheduling, and the
//! remote service endpoint. Values come from the builder with an environment
//! override for the server URL.

use std::time::Duration;

use thiserror::Error;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Queue flush interval when the reduce-sync-frequency setting is off
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Queue flush interval when the reduce-sync-frequency setting is on
const REDUCED_FLUSH_INTERVAL: Duration = Duration::from_secs(120);

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    server_url: String,
    /// Device identifier sent with check-ins for remote-side auditing
    device_id: Option<String>,
    /// Retry budget for ordinary remote mutations
    pub action_retry: RetrySettings,
    /// Retry budget for emergency alerts
    pub alert_retry: RetrySettings,
    /// Backoff schedule for queued check-in replay
    pub queue_backoff: RetrySettings,
    /// Widen the periodic flush interval
    pub reduce_sync_frequency: bool,
    /// Debounce window for the reconciliation sweep
    pub reconcile_debounce: Duration,
    /// Age after which an abandoned dedup key is swept
    pub dedup_stale_after: Duration,
}

/// Retry attempt budget and backoff bounds
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Maximum number of attempts
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let server_url = std::env::var("PATROLSYNC_SERVER_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self {
            server_url,
            device_id: None,
            action_retry: RetrySettings {
                max_retries: 3,
                base_delay: Duration::from_millis(1000),
                max_delay: Duration::from_millis(5000),
            },
            alert_retry: RetrySettings {
                max_retries: 5,
                base_delay: Duration::from_millis(1000),
                max_delay: Duration::from_millis(5000),
            },
            queue_backoff: RetrySettings {
                max_retries: 5,
                base_delay: Duration::from_millis(1000),
                max_delay: Duration::from_millis(30000),
            },
            reduce_sync_frequency: false,
            reconcile_debounce: Duration::from_millis(1000),
            dedup_stale_after: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ConfigBuilder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Device identifier reported alongside check-ins
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Periodic queue flush interval, honoring the reduce-sync-frequency setting
    pub fn flush_interval(&self) -> Duration {
        if self.reduce_sync_frequency {
            REDUCED_FLUSH_INTERVAL
        } else {
            DEFAULT_FLUSH_INTERVAL
        }
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server_url: Option<String>,
    device_id: Option<String>,
    reduce_sync_frequency: bool,
    reconcile_debounce: Option<Duration>,
}

impl ConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the device identifier
    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    /// Widen the periodic flush interval
    pub fn reduce_sync_frequency(mut self, reduce: bool) -> Self {
        self.reduce_sync_frequency = reduce;
        self
    }

    /// Set the reconciliation debounce window
    pub fn reconcile_debounce(mut self, debounce: Duration) -> Self {
        self.reconcile_debounce = Some(debounce);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        if let Some(url) = self.server_url {
            if url.is_empty() {
                return Err(ConfigError::InvalidUrl(url));
            }
            config.server_url = url;
        }
        config.device_id = self.device_id;
        config.reduce_sync_frequency = self.reduce_sync_frequency;
        if let Some(debounce) = self.reconcile_debounce {
            config.reconcile_debounce = debounce;
        }
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}
