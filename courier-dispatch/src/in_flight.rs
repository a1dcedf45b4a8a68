//! Per-key serialisation of dispatches
//!
//! A dispatch holds the lock for its message key from the dedup check until
//! its terminal result, so two concurrent sends of the same content cannot
//! both pass the dedup check. Sends of different keys never contend.

use std::sync::Arc;

use courier_common::MessageKey;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-key locks for dispatches currently in flight
#[derive(Debug, Default)]
pub struct InFlight {
    locks: Arc<DashMap<MessageKey, Arc<Mutex<()>>>>,
}

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other dispatch holds `key`, then take it.
    ///
    /// The key is released when the returned guard is dropped, including when
    /// the owning future is cancelled.
    pub async fn acquire(&self, key: &MessageKey) -> KeyGuard {
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = lock.lock_owned().await;

        KeyGuard {
            locks: Arc::clone(&self.locks),
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive hold on a message key
#[derive(Debug)]
pub struct KeyGuard {
    locks: Arc<DashMap<MessageKey, Arc<Mutex<()>>>>,
    key: MessageKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts this holder
        drop(self.guard.take());

        // Only the registry's reference left: nobody holds or awaits the key
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
