//! Policy abstractions for dispatch operations.
//!
//! - [`RetryPolicy`]: Backoff timing and the optional attempt ceiling
//! - [`Rotation`]: Per-dispatch position in the provider rotation

pub mod retry;

pub use retry::{Next, RetryPolicy, Rotation};
