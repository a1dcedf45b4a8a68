//! Outbound message model and its deduplication identity

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An outbound message as submitted by a caller.
///
/// Messages are immutable once built; the fields are reference counted so
/// that audit records and retries can hold on to the message cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    recipient: Arc<str>,
    subject: Arc<str>,
    body: Arc<str>,
}

impl Message {
    #[must_use]
    pub fn new(
        recipient: impl Into<Arc<str>>,
        subject: impl Into<Arc<str>>,
        body: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Derive the deduplication key for this message.
    #[must_use]
    pub fn key(&self) -> MessageKey {
        MessageKey::derive(&self.recipient, &self.subject, &self.body)
    }
}

/// Deterministic identity of a message's content.
///
/// Two messages with identical recipient, subject and body always produce the
/// same key. Submission time is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageKey(Arc<str>);

impl MessageKey {
    /// SHA-256 over the length-prefixed fields, hex encoded.
    ///
    /// Each field is prefixed with its byte length so that moving text between
    /// adjacent fields changes the key.
    #[must_use]
    pub fn derive(recipient: &str, subject: &str, body: &str) -> Self {
        let mut hasher = Sha256::new();

        for field in [recipient, subject, body] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }

        Self(hex::encode(hasher.finalize()).into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
