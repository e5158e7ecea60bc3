use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::OutboxError;
use crate::mail::OutgoingMail;

/// Identifier of a queued message. Generated as a UUID v4 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        MessageId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        MessageId(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId(id.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persisted payload of one pending notification, stored as JSON at `email:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: MessageId,
    #[serde(flatten)]
    pub mail: OutgoingMail,
    /// Failed delivery attempts so far. Only tracked when a retry bound is configured.
    #[serde(default)]
    pub attempts: u32,
    pub queued_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn new(mail: OutgoingMail) -> Self {
        Self {
            id: MessageId::generate(),
            mail,
            attempts: 0,
            queued_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<String, OutboxError> {
        serde_json::to_string(self).map_err(|e| OutboxError::Encode(e.to_string()))
    }

    /// Parses the payload stored under `expected`'s key. Missing fields, wrong types,
    /// an id that does not match the key, and mail that no longer passes validation
    /// are all decode errors. Unknown fields are ignored.
    pub fn decode(payload: &str, expected: &MessageId) -> Result<Self, OutboxError> {
        let message: QueuedMessage =
            serde_json::from_str(payload).map_err(|e| OutboxError::Decode(e.to_string()))?;
        if message.id != *expected {
            return Err(OutboxError::Decode(format!(
                "payload id {} does not match key id {}",
                message.id, expected
            )));
        }
        message
            .mail
            .validate()
            .map_err(|e| OutboxError::Decode(e.to_string()))?;
        Ok(message)
    }
}

/// Why a `process_one` call did not deliver the message it popped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The body expired or was never written. The message is lost.
    BodyNotFound,
    /// The stored body could not be decoded. The message is dropped from the queue.
    Malformed(String),
    /// The transport rejected the message or timed out. The id was requeued.
    Transport(String),
}

/// Result of a single `process_one` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Delivered { id: MessageId },
    Empty,
    Failed { id: MessageId, reason: FailureReason },
    /// The retry bound was reached; the id moved to the dead-letter list.
    DeadLettered { id: MessageId, attempts: u32 },
}

/// Counts of outcomes produced by one `drain` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

impl DrainReport {
    pub fn processed(&self) -> usize {
        self.delivered + self.failed + self.dead_lettered
    }
}
