//! Append-only record of dispatch outcomes

use std::{sync::Arc, time::SystemTime};

use courier_common::Message;
use parking_lot::RwLock;
use serde::Serialize;
use ulid::Ulid;

/// The outcome of one provider attempt, or of a whole dispatch when it ends
/// without a provider being involved (exhaustion, cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    /// Identifier shared by every outcome of one `send` call
    pub dispatch_id: Ulid,
    pub message: Message,
    /// Provider that handled the attempt, if any
    pub provider: Option<Arc<str>>,
    /// Overall attempt number (1-based), if this outcome belongs to an attempt
    pub attempt: Option<u32>,
    pub succeeded: bool,
    pub note: String,
    pub timestamp: SystemTime,
}

impl DispatchOutcome {
    pub(crate) fn attempt(
        dispatch_id: Ulid,
        message: &Message,
        provider: &Arc<str>,
        attempt: u32,
        result: Result<(), String>,
    ) -> Self {
        let (succeeded, note) = match result {
            Ok(()) => (true, format!("delivered via {provider}")),
            Err(reason) => (false, reason),
        };

        Self {
            dispatch_id,
            message: message.clone(),
            provider: Some(Arc::clone(provider)),
            attempt: Some(attempt),
            succeeded,
            note,
            timestamp: SystemTime::now(),
        }
    }

    pub(crate) fn terminal(dispatch_id: Ulid, message: &Message, note: String) -> Self {
        Self {
            dispatch_id,
            message: message.clone(),
            provider: None,
            attempt: None,
            succeeded: false,
            note,
            timestamp: SystemTime::now(),
        }
    }
}

/// In-memory audit log.
///
/// Outcomes are only ever appended; reads return a snapshot in insertion
/// order.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<DispatchOutcome>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: DispatchOutcome) {
        self.entries.write().push(outcome);
    }

    /// Snapshot of every recorded outcome, oldest first
    pub fn read_all(&self) -> Vec<DispatchOutcome> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
