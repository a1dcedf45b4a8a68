//! Providers that succeed or fail at random

use std::time::Duration;

use async_trait::async_trait;
use courier_dispatch::{Message, Provider, ProviderError};
use rand::Rng;
use tracing::trace;

use crate::config::SimulatedProviderConfig;

/// A stand-in for an external delivery service.
///
/// Each attempt waits `latency`, then fails with probability `failure_rate`.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    name: String,
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedProvider {
    /// `failure_rate` is clamped to `[0, 1]`, NaN counts as never failing
    pub fn new(name: impl Into<String>, failure_rate: f64, latency: Duration) -> Self {
        Self {
            name: name.into(),
            failure_rate: if failure_rate.is_nan() {
                0.0
            } else {
                failure_rate.clamp(0.0, 1.0)
            },
            latency,
        }
    }
}

impl From<&SimulatedProviderConfig> for SimulatedProvider {
    fn from(config: &SimulatedProviderConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.failure_rate,
            Duration::from_millis(config.latency_ms),
        )
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: &Message) -> Result<(), ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = rand::rng().random_bool(self.failure_rate);
        trace!(
            provider = %self.name,
            recipient = message.recipient(),
            failed,
            "Simulated delivery"
        );

        if failed {
            Err(ProviderError::Unavailable(format!(
                "{} did not accept the message",
                self.name
            )))
        } else {
            Ok(())
        }
    }
}
