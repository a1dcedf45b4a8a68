//! Typed error handling for dispatch operations.
//!
//! Errors are split by who sees them:
//! - [`DispatchError`]: terminal results surfaced to the caller of `send`
//! - [`ProviderError`]: per-attempt provider failures, consumed by the
//!   failover engine and never surfaced directly
//! - [`ConfigError`]: invalid construction parameters

use std::time::Duration;

use thiserror::Error;

/// Terminal failure of a dispatch, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// An identical message was already dispatched successfully.
    #[error("duplicate")]
    Duplicate,

    /// The current rate window has no capacity left.
    #[error("rate limited")]
    RateLimited,

    /// The configured attempt ceiling was reached without any provider
    /// accepting the message.
    #[error("all providers exhausted after {attempts} attempts")]
    AllProvidersExhausted { attempts: u32 },

    /// The dispatcher is shutting down.
    #[error("cancelled")]
    Cancelled,

    /// The caller's deadline elapsed before a terminal result.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl DispatchError {
    /// Returns `true` if the message was rejected before any provider was
    /// contacted.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Duplicate | Self::RateLimited)
    }
}

/// Failure reported by a provider for a single delivery attempt.
///
/// The engine treats every variant the same way: record, then retry or rotate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider refused the message.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached or is degraded.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The attempt did not complete within the attempt timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other provider specific failure.
    #[error("{0}")]
    Other(String),
}

/// Invalid dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// At least one provider is required.
    #[error("no providers configured")]
    NoProviders,

    /// A value is outside its accepted range.
    #[error("invalid configuration for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}
