//! The delivery provider capability consumed by the failover engine

use async_trait::async_trait;
use courier_common::Message;

use crate::error::ProviderError;

/// A delivery provider able to accept outbound messages.
///
/// Implementations wrap an external delivery service. The engine holds
/// providers behind `Arc<dyn Provider>` and never mutates them; any failure
/// returned from [`Provider::deliver`] is retried or rotated away from.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Stable name used to attribute outcomes to this provider
    fn name(&self) -> &str;

    /// Attempt to deliver a message
    ///
    /// # Errors
    /// If the provider did not accept the message
    async fn deliver(&self, message: &Message) -> Result<(), ProviderError>;
}
