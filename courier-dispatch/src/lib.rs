//! Outbound message dispatch with deduplication, rate limiting and provider
//! failover
//!
//! This crate provides functionality to:
//! - Reject messages whose content was already dispatched
//! - Bound dispatch throughput per fixed time window
//! - Retry failed deliveries with exponential backoff
//! - Rotate through interchangeable delivery providers
//! - Keep an append-only audit log of every attempt

mod audit_log;
mod config;
mod dedup;
mod dispatcher;
mod engine;
mod error;
mod in_flight;
pub mod policy;
mod provider;
mod rate_limiter;

pub use audit_log::{AuditLog, DispatchOutcome};
pub use config::DispatchConfig;
pub use courier_common::{Message, MessageKey, audit::AuditConfig};
pub use dedup::DedupGuard;
pub use dispatcher::{Dispatcher, SendResult};
pub use engine::{Delivered, FailoverEngine};
pub use error::{ConfigError, DispatchError, ProviderError};
pub use in_flight::{InFlight, KeyGuard};
pub use provider::Provider;
pub use rate_limiter::{RateLimitStats, RateLimiter};
