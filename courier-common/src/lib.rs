pub mod audit;
pub mod logging;
pub mod message;

pub use message::{Message, MessageKey};
pub use tracing;
