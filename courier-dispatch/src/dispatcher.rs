//! Public entry point composing dedup, rate limiting and failover

use std::{sync::Arc, time::Duration};

use courier_common::{Message, internal};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    audit_log::{AuditLog, DispatchOutcome},
    config::DispatchConfig,
    dedup::DedupGuard,
    engine::{Delivered, FailoverEngine},
    error::{ConfigError, DispatchError},
    in_flight::InFlight,
    policy::RetryPolicy,
    provider::Provider,
    rate_limiter::{RateLimitStats, RateLimiter},
};

/// Dispatches messages through the configured providers.
///
/// A dispatcher owns all mutable dispatch state (sent keys, rate window,
/// audit log) for its lifetime. Share it between tasks behind an `Arc`.
#[derive(Debug)]
pub struct Dispatcher {
    dedup: DedupGuard,
    rate_limiter: RateLimiter,
    in_flight: InFlight,
    engine: FailoverEngine,
    log: Arc<AuditLog>,
    shutdown: watch::Sender<bool>,
}

impl Dispatcher {
    /// Create a new dispatcher over `providers`, tried in order.
    ///
    /// # Errors
    /// If the configuration is invalid or no providers are given
    pub fn new(
        config: DispatchConfig,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let log = Arc::new(AuditLog::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let engine = FailoverEngine::new(
            providers,
            RetryPolicy::from(&config),
            config.attempt_timeout(),
            config.audit.clone(),
            Arc::clone(&log),
            shutdown_rx,
        )?;

        internal!(
            level = INFO,
            "Dispatcher ready with providers {:?}, max_retries={}, rate_limit={} per {}ms",
            engine.provider_names(),
            config.max_retries,
            config.rate_limit,
            config.rate_window_ms
        );

        Ok(Self {
            dedup: DedupGuard::new(),
            rate_limiter: RateLimiter::new(config.rate_limit, config.rate_window()),
            in_flight: InFlight::new(),
            engine,
            log,
            shutdown,
        })
    }

    /// Dispatch a message.
    ///
    /// Sends of identical content are serialised, so concurrent duplicates
    /// wait for the first one and are then rejected as duplicates.
    ///
    /// # Errors
    /// - `Duplicate` if identical content was already dispatched
    /// - `RateLimited` if the current window is full
    /// - `AllProvidersExhausted` if an attempt ceiling is configured and hit
    /// - `Cancelled` if the dispatcher is shutting down
    #[tracing::instrument(skip_all, fields(key = tracing::field::Empty))]
    pub async fn send(&self, message: &Message) -> Result<Delivered, DispatchError> {
        if self.is_shutting_down() {
            return Err(DispatchError::Cancelled);
        }

        let key = message.key();
        tracing::Span::current().record("key", key.short());

        let _guard = self.in_flight.acquire(&key).await;

        // Shutdown may have started while waiting for the key
        if self.is_shutting_down() {
            return Err(DispatchError::Cancelled);
        }

        if self.dedup.is_duplicate(&key) {
            debug!("Rejecting duplicate message");
            return Err(DispatchError::Duplicate);
        }

        if !self.rate_limiter.admit() {
            return Err(DispatchError::RateLimited);
        }

        let delivered = self.engine.dispatch(message).await?;
        self.dedup.mark_sent(key);

        Ok(delivered)
    }

    /// Dispatch a message, giving up once `timeout` elapses.
    ///
    /// Attempts already made stay in the audit log; the message is not marked
    /// as sent.
    ///
    /// # Errors
    /// As [`Dispatcher::send`], plus `TimedOut`
    pub async fn send_with_timeout(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<Delivered, DispatchError> {
        tokio::time::timeout(timeout, self.send(message))
            .await
            .unwrap_or(Err(DispatchError::TimedOut(timeout)))
    }

    /// Snapshot of every recorded dispatch outcome, oldest first
    pub fn log(&self) -> Vec<DispatchOutcome> {
        self.log.read_all()
    }

    /// Cancel in-flight dispatches and reject new ones
    pub fn shutdown(&self) {
        internal!(level = INFO, "Dispatcher shutting down");
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn rate_limit_stats(&self) -> RateLimitStats {
        self.rate_limiter.stats()
    }

    /// Number of distinct messages dispatched successfully
    pub fn sent_count(&self) -> usize {
        self.dedup.len()
    }
}

/// Caller facing summary of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub success: bool,
    pub provider_name: Option<String>,
    pub error: Option<String>,
}

impl From<&Result<Delivered, DispatchError>> for SendResult {
    fn from(result: &Result<Delivered, DispatchError>) -> Self {
        match result {
            Ok(delivered) => Self {
                success: true,
                provider_name: Some(delivered.provider.to_string()),
                error: None,
            },
            Err(error) => Self {
                success: false,
                provider_name: None,
                error: Some(error.to_string()),
            },
        }
    }
}
