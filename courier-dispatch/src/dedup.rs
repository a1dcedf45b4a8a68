//! Deduplication of successfully dispatched messages
//!
//! The guard remembers the key of every message that a provider accepted.
//! Keys are never evicted; the set lives as long as the dispatcher.

use courier_common::MessageKey;
use dashmap::DashSet;

/// Set of message keys that have been dispatched successfully
#[derive(Debug, Default)]
pub struct DedupGuard {
    sent: DashSet<MessageKey>,
}

impl DedupGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a message with this key was already dispatched
    pub fn is_duplicate(&self, key: &MessageKey) -> bool {
        self.sent.contains(key)
    }

    /// Remember that a message with this key was dispatched
    pub fn mark_sent(&self, key: MessageKey) {
        self.sent.insert(key);
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
