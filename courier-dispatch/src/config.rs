//! Dispatcher configuration

use std::time::Duration;

use courier_common::audit::AuditConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay_ms() -> u64 {
    1000 // 1 second
}

const fn default_rate_limit() -> u32 {
    5
}

const fn default_rate_window_ms() -> u64 {
    60_000 // 1 minute
}

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// Providers are supplied separately to `Dispatcher::new`, since they are
/// live objects rather than data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Attempts against one provider before rotating to the next
    ///
    /// Default: 3
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (in milliseconds)
    ///
    /// Default: 1000 (1 second)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Dispatches admitted per rate window
    ///
    /// Default: 5
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Length of the fixed rate window (in milliseconds)
    ///
    /// Default: 60000 (1 minute)
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Ceiling on provider calls for a single dispatch
    ///
    /// When unset, a dispatch keeps rotating through providers until one
    /// succeeds. When set, reaching the ceiling ends the dispatch with
    /// `AllProvidersExhausted`.
    ///
    /// Default: None (unbounded)
    #[serde(default)]
    pub max_total_attempts: Option<u32>,

    /// Maximum single backoff wait (in milliseconds)
    ///
    /// Default: None (uncapped)
    #[serde(default)]
    pub max_retry_delay_ms: Option<u64>,

    /// Jitter factor for backoff waits (0.0 to 1.0)
    ///
    /// A factor of 0.2 means ±20% randomness.
    ///
    /// Default: 0.0 (exact backoff)
    #[serde(default)]
    pub retry_jitter_factor: f64,

    /// Timeout for a single provider call (in milliseconds)
    ///
    /// A call exceeding it counts as a failed attempt.
    ///
    /// Default: None (wait for the provider)
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,

    /// Audit event configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            rate_limit: default_rate_limit(),
            rate_window_ms: default_rate_window_ms(),
            max_total_attempts: None,
            max_retry_delay_ms: None,
            retry_jitter_factor: 0.0,
            attempt_timeout_ms: None,
            audit: AuditConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Check that every value is within its accepted range.
    ///
    /// # Errors
    /// Returns the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.rate_window_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.max_total_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_total_attempts",
                reason: "must be greater than zero when set".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            return Err(ConfigError::Invalid {
                field: "retry_jitter_factor",
                reason: format!("{} is outside 0.0..=1.0", self.retry_jitter_factor),
            });
        }

        Ok(())
    }

    pub(crate) const fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub(crate) fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}
