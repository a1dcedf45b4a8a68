//! Retry and failover across delivery providers
//!
//! The engine drives a single dispatch through the provider rotation:
//!
//! ```text
//! ATTEMPT(provider, n) ──success──> SUCCESS
//!        │
//!     failure
//!        │
//!        ├── n + 1 < max_retries ──> backoff ──> ATTEMPT(provider, n + 1)
//!        └── n + 1 == max_retries ─> backoff ──> ATTEMPT(next provider, 0)
//! ```
//!
//! Each backoff waits `base * 2^n` where `n` is the attempt counter after the
//! retry/rotation decision, so waits escalate while retrying one provider and
//! reset when rotating. Without an attempt ceiling the loop only ends when a
//! provider succeeds or the dispatcher shuts down.

use std::{sync::Arc, time::Duration};

use courier_common::{Message, audit::{self, AuditConfig}, internal};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info};
use ulid::Ulid;

use crate::{
    audit_log::{AuditLog, DispatchOutcome},
    error::{ConfigError, DispatchError, ProviderError},
    policy::{Next, RetryPolicy, Rotation},
    provider::Provider,
};

/// A message accepted by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Identifier shared by every audit entry of this dispatch
    pub dispatch_id: Ulid,
    /// Provider that accepted the message
    pub provider: Arc<str>,
    /// Provider calls made, including the successful one
    pub attempts: u32,
}

/// Drives dispatches through the ordered provider list.
#[derive(Debug)]
pub struct FailoverEngine {
    providers: Vec<Arc<dyn Provider>>,
    names: Vec<Arc<str>>,
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
    audit: AuditConfig,
    log: Arc<AuditLog>,
    shutdown: watch::Receiver<bool>,
}

impl FailoverEngine {
    /// Create a new engine over `providers`, tried in order.
    ///
    /// # Errors
    /// If `providers` is empty or the policy never allows a retry
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        policy: RetryPolicy,
        attempt_timeout: Option<Duration>,
        audit: AuditConfig,
        log: Arc<AuditLog>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        if policy.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "must be greater than zero".to_string(),
            });
        }

        let names = providers
            .iter()
            .map(|provider| Arc::from(provider.name()))
            .collect();

        Ok(Self {
            providers,
            names,
            policy,
            attempt_timeout,
            audit,
            log,
            shutdown,
        })
    }

    pub fn provider_names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// Run a dispatch until a provider accepts the message.
    ///
    /// Every attempt is recorded in the audit log. Provider failures never
    /// escape this function; only the terminal result does.
    ///
    /// # Errors
    /// `AllProvidersExhausted` when an attempt ceiling is configured and
    /// reached, `Cancelled` when the dispatcher shuts down mid-dispatch.
    #[tracing::instrument(level = "debug", skip_all, fields(dispatch_id = tracing::field::Empty))]
    pub async fn dispatch(&self, message: &Message) -> Result<Delivered, DispatchError> {
        let dispatch_id = Ulid::new();
        tracing::Span::current().record("dispatch_id", tracing::field::display(dispatch_id));

        let mut shutdown = self.shutdown.clone();
        let started = Instant::now();
        let mut rotation = Rotation::default();
        let mut total_attempts = 0;

        loop {
            // Only provider calls actually made count as attempts
            let stopping = *shutdown.borrow();
            if stopping {
                return Err(self.cancel(dispatch_id, message, total_attempts));
            }

            let index = rotation.provider_index;
            let name = &self.names[index];
            total_attempts += 1;

            audit::log_dispatch_attempt(
                &self.audit,
                &dispatch_id.to_string(),
                message.recipient(),
                name,
                total_attempts,
            );

            let result = tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    return Err(self.cancel(dispatch_id, message, total_attempts));
                }
                result = self.attempt(self.providers[index].as_ref(), message) => result,
            };

            let error = match result {
                Ok(()) => {
                    self.log.record(DispatchOutcome::attempt(
                        dispatch_id,
                        message,
                        name,
                        total_attempts,
                        Ok(()),
                    ));
                    audit::log_dispatch_success(
                        &self.audit,
                        &dispatch_id.to_string(),
                        message.recipient(),
                        name,
                        total_attempts,
                        started.elapsed().as_millis(),
                    );

                    return Ok(Delivered {
                        dispatch_id,
                        provider: Arc::clone(name),
                        attempts: total_attempts,
                    });
                }
                Err(error) => error,
            };

            let reason = error.to_string();
            self.log.record(DispatchOutcome::attempt(
                dispatch_id,
                message,
                name,
                total_attempts,
                Err(reason.clone()),
            ));

            let exhausted = !self.policy.should_continue(total_attempts);
            let next = rotation.on_failure(self.policy.max_retries, self.providers.len());

            audit::log_dispatch_failure(
                &self.audit,
                &dispatch_id.to_string(),
                message.recipient(),
                name,
                &reason,
                total_attempts,
                &self.describe(next, exhausted),
            );

            if exhausted {
                return Err(self.exhaust(dispatch_id, message, total_attempts));
            }

            if let Next::Rotate { from, to } = next {
                info!(
                    dispatch_id = %dispatch_id,
                    from = %self.names[from],
                    to = %self.names[to],
                    attempts = total_attempts,
                    "Rotating to next provider"
                );
            }

            let delay = self.policy.backoff_delay(rotation.attempt_count);
            debug!(
                dispatch_id = %dispatch_id,
                provider = %self.names[next.provider()],
                delay_ms = delay.as_millis(),
                "Backing off before next attempt"
            );

            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    return Err(self.cancel(dispatch_id, message, total_attempts));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// What follows a failed attempt, as reported in the failure audit event
    fn describe(&self, next: Next, exhausted: bool) -> String {
        if exhausted {
            return "exhausted".to_string();
        }

        match next {
            Next::Retry { .. } => "retry".to_string(),
            Next::Rotate { to, .. } => format!("rotate to {}", self.names[to]),
        }
    }

    /// Make one provider call, bounded by the attempt timeout if configured
    async fn attempt(
        &self,
        provider: &dyn Provider,
        message: &Message,
    ) -> Result<(), ProviderError> {
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, provider.deliver(message))
                .await
                .unwrap_or(Err(ProviderError::Timeout(limit))),
            None => provider.deliver(message).await,
        }
    }

    fn exhaust(&self, dispatch_id: Ulid, message: &Message, attempts: u32) -> DispatchError {
        let error = DispatchError::AllProvidersExhausted { attempts };

        self.log.record(DispatchOutcome::terminal(
            dispatch_id,
            message,
            error.to_string(),
        ));
        audit::log_dispatch_exhausted(
            &self.audit,
            &dispatch_id.to_string(),
            message.recipient(),
            attempts,
        );

        error
    }

    fn cancel(&self, dispatch_id: Ulid, message: &Message, attempts: u32) -> DispatchError {
        internal!(
            level = DEBUG,
            "Dispatch {} cancelled by shutdown after {} attempts",
            dispatch_id,
            attempts
        );

        self.log.record(DispatchOutcome::terminal(
            dispatch_id,
            message,
            format!("cancelled after {attempts} attempts"),
        ));
        audit::log_dispatch_cancelled(
            &self.audit,
            &dispatch_id.to_string(),
            message.recipient(),
            attempts,
        );

        DispatchError::Cancelled
    }
}

/// Resolves once shutdown has been requested.
///
/// Never resolves if the sending side is gone, since nobody can request a
/// shutdown any more.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
