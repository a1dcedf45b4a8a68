//! Retry and provider rotation policy.
//!
//! Encapsulates the backoff arithmetic and the per-dispatch rotation state so
//! that retry behaviour can be tested independently of the engine that drives
//! the providers.

use std::time::Duration;

use rand::Rng;

use crate::config::DispatchConfig;

/// Retry policy for a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts made against one provider before rotating to the next.
    pub max_retries: u32,

    /// Base delay for exponential backoff.
    ///
    /// The wait after a failure is `base * 2^attempt_count`, where
    /// `attempt_count` is the per-provider counter after the retry/rotation
    /// decision.
    pub base_delay: Duration,

    /// Caps a single backoff wait, if set.
    pub max_delay: Option<Duration>,

    /// Randomises each wait within ±`jitter_factor`.
    pub jitter_factor: f64,

    /// Ceiling on provider calls for one dispatch. `None` retries until a
    /// provider succeeds.
    pub max_total_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: config.max_retry_delay_ms.map(Duration::from_millis),
            jitter_factor: config.retry_jitter_factor,
            max_total_attempts: config.max_total_attempts,
        }
    }
}

impl RetryPolicy {
    /// Check if another provider call may be made after `total_attempts`
    /// calls.
    #[must_use]
    pub fn should_continue(&self, total_attempts: u32) -> bool {
        self.max_total_attempts.is_none_or(|max| total_attempts < max)
    }

    /// Calculate how long to wait before the next attempt.
    ///
    /// # Formula
    /// `delay = min(base * 2^attempt_count, max_delay) * (1 ± jitter)`
    #[must_use]
    pub fn backoff_delay(&self, attempt_count: u32) -> Duration {
        let delay = 1u32
            .checked_shl(attempt_count)
            .map_or(Duration::MAX, |multiplier| {
                self.base_delay.saturating_mul(multiplier)
            });

        let delay = self.max_delay.map_or(delay, |max| delay.min(max));

        if self.jitter_factor <= 0.0 {
            return delay;
        }

        let jitter_range = delay.as_secs_f64() * self.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        Duration::try_from_secs_f64((delay.as_secs_f64() + jitter).max(0.0)).unwrap_or(delay)
    }
}

/// What the engine does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Try the same provider again
    Retry { provider: usize },
    /// Move on to another provider with a fresh attempt counter
    Rotate { from: usize, to: usize },
}

impl Next {
    /// Index of the provider the next attempt targets
    #[must_use]
    pub const fn provider(self) -> usize {
        match self {
            Self::Retry { provider } | Self::Rotate { to: provider, .. } => provider,
        }
    }
}

/// Position of a dispatch in the provider rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rotation {
    /// Index of the provider the next attempt targets
    pub provider_index: usize,
    /// Failed attempts against the current provider
    pub attempt_count: u32,
}

impl Rotation {
    /// Advance the rotation after a failed attempt.
    ///
    /// The attempt counter is incremented; once it reaches `max_retries` the
    /// rotation moves to the next provider (wrapping around) and the counter
    /// resets to zero.
    pub fn on_failure(&mut self, max_retries: u32, provider_count: usize) -> Next {
        self.attempt_count += 1;

        if self.attempt_count >= max_retries {
            let from = self.provider_index;
            self.provider_index = (self.provider_index + 1) % provider_count;
            self.attempt_count = 0;
            Next::Rotate {
                from,
                to: self.provider_index,
            }
        } else {
            Next::Retry {
                provider: self.provider_index,
            }
        }
    }
}
