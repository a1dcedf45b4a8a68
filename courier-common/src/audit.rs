//! Audit events for the dispatch lifecycle
//!
//! Every dispatch attempt and terminal outcome is emitted as a structured
//! `tracing` event so that it can be shipped alongside the regular logs.
//!
//! ## Audit Events
//!
//! - `DispatchAttempt`: A provider is about to be contacted
//! - `DispatchSuccess`: A provider accepted the message
//! - `DispatchFailure`: A provider attempt failed and will be retried
//! - `DispatchExhausted`: The attempt ceiling was reached without success
//! - `DispatchCancelled`: The dispatch was abandoned before a terminal result
//!
//! ## PII Redaction
//!
//! The recipient address can be redacted through [`AuditConfig`], keeping
//! only the domain.

use serde::{Deserialize, Serialize};

/// Audit logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Emit audit events for the dispatch lifecycle
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redact recipient addresses from audit events (PII protection)
    #[serde(default)]
    pub redact_recipient: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_recipient: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Redact email address if redaction is enabled
#[must_use]
pub fn redact_email(email: &str, redact: bool) -> String {
    if redact {
        // Keep domain but redact local part
        if let Some((_, domain)) = email.split_once('@') {
            format!("[REDACTED]@{domain}")
        } else {
            "[REDACTED]".to_string()
        }
    } else {
        email.to_string()
    }
}

/// Log dispatch attempt event
///
/// # Fields
/// - `dispatch_id`: Identifier shared by every attempt of one dispatch
/// - `recipient`: Recipient address (redacted if configured)
/// - `provider`: Provider about to be contacted
/// - `attempt`: Overall attempt number (1-based)
pub fn log_dispatch_attempt(
    config: &AuditConfig,
    dispatch_id: &str,
    recipient: &str,
    provider: &str,
    attempt: u32,
) {
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DispatchAttempt",
        dispatch_id = %dispatch_id,
        recipient = %redact_email(recipient, config.redact_recipient),
        provider = %provider,
        attempt = attempt,
        "Audit: Dispatch attempt"
    );
}

/// Log dispatch success event
///
/// # Fields
/// - `dispatch_id`: Identifier shared by every attempt of one dispatch
/// - `recipient`: Recipient address (redacted if configured)
/// - `provider`: Provider that accepted the message
/// - `attempt`: Final attempt number
/// - `duration_ms`: Time from first attempt to acceptance
pub fn log_dispatch_success(
    config: &AuditConfig,
    dispatch_id: &str,
    recipient: &str,
    provider: &str,
    attempt: u32,
    duration_ms: u128,
) {
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::INFO,
        event = "DispatchSuccess",
        dispatch_id = %dispatch_id,
        recipient = %redact_email(recipient, config.redact_recipient),
        provider = %provider,
        attempt = attempt,
        duration_ms = duration_ms,
        "Audit: Dispatch successful"
    );
}

/// Log dispatch failure event
///
/// Logged for every failed provider attempt, including the decision taken.
///
/// # Fields
/// - `dispatch_id`: Identifier shared by every attempt of one dispatch
/// - `recipient`: Recipient address (redacted if configured)
/// - `provider`: Provider that failed
/// - `error`: Failure reason
/// - `attempt`: Overall attempt number
/// - `next`: What happens next (retry or rotation target)
pub fn log_dispatch_failure(
    config: &AuditConfig,
    dispatch_id: &str,
    recipient: &str,
    provider: &str,
    error: &str,
    attempt: u32,
    next: &str,
) {
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DispatchFailure",
        dispatch_id = %dispatch_id,
        recipient = %redact_email(recipient, config.redact_recipient),
        provider = %provider,
        error = %error,
        attempt = attempt,
        next = %next,
        "Audit: Dispatch attempt failed"
    );
}

/// Log dispatch exhaustion event
pub fn log_dispatch_exhausted(
    config: &AuditConfig,
    dispatch_id: &str,
    recipient: &str,
    attempts: u32,
) {
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DispatchExhausted",
        dispatch_id = %dispatch_id,
        recipient = %redact_email(recipient, config.redact_recipient),
        attempts = attempts,
        "Audit: All providers exhausted"
    );
}

/// Log dispatch cancellation event
pub fn log_dispatch_cancelled(
    config: &AuditConfig,
    dispatch_id: &str,
    recipient: &str,
    attempts: u32,
) {
    if !config.enabled {
        return;
    }

    tracing::event!(
        tracing::Level::WARN,
        event = "DispatchCancelled",
        dispatch_id = %dispatch_id,
        recipient = %redact_email(recipient, config.redact_recipient),
        attempts = attempts,
        "Audit: Dispatch cancelled"
    );
}
