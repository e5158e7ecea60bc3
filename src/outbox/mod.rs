//!
//! # Email Outbox
//!
//! A durable, at-least-once queue for notification mail, built on the list and key
//! primitives of a `KeyValueStore`.
//!
//! Each message body is stored as JSON at `email:{id}` with a 24-hour TTL and its id
//! is pushed onto the `email:queue` list. `Outbox::process_one` pops the oldest id,
//! loads the body, and hands it to the `MailTransport`. On success the body is
//! deleted; on failure the id is pushed back onto the queue at the same end new work
//! goes in, so a failed message is retried only after everything queued after it.
//!
//! The outbox owns no timer. Callers decide when to call `process_one` (or `drain`);
//! `run_drain_loop` is available for a fixed-interval schedule.

mod message;

pub use message::{DrainReport, FailureReason, MessageId, ProcessOutcome, QueuedMessage};

use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use validator::{Validate, ValidationErrors};

use crate::mail::{MailTransport, OutgoingMail, TransportError};
use crate::store::{KeyValueStore, StoreError};

/// List holding the ids of pending messages.
pub const QUEUE_KEY: &str = "email:queue";
/// List holding the ids of messages that exhausted their retry bound.
pub const DEAD_LETTER_KEY: &str = "email:dead";
/// How long a stored message body stays readable.
pub const MESSAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn message_key(id: &MessageId) -> String {
    format!("email:{}", id)
}

/// Errors surfaced by the outbox. Expected conditions (empty queue, missing body,
/// transport rejection inside `process_one`) are reported through `ProcessOutcome`
/// instead.
#[derive(Debug)]
pub enum OutboxError {
    /// A store operation failed while processing the queue.
    Store(StoreError),
    /// Writing a new message (body or queue entry) failed.
    QueueWrite(StoreError),
    /// The message failed validation and was not queued or sent.
    Invalid(String),
    /// A stored payload could not be decoded.
    Decode(String),
    /// A message could not be serialized.
    Encode(String),
    /// Immediate delivery failed.
    Transport(TransportError),
}

impl fmt::Display for OutboxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutboxError::Store(err) => write!(f, "Outbox store error: {}", err),
            OutboxError::QueueWrite(err) => write!(f, "Failed to queue email: {}", err),
            OutboxError::Invalid(msg) => write!(f, "Invalid email: {}", msg),
            OutboxError::Decode(msg) => write!(f, "Malformed queued email: {}", msg),
            OutboxError::Encode(msg) => write!(f, "Failed to encode email: {}", msg),
            OutboxError::Transport(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for OutboxError {}

impl From<StoreError> for OutboxError {
    fn from(error: StoreError) -> OutboxError {
        OutboxError::Store(error)
    }
}

impl From<ValidationErrors> for OutboxError {
    fn from(error: ValidationErrors) -> OutboxError {
        OutboxError::Invalid(error.to_string())
    }
}

/// Tunables for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxSettings {
    /// Upper bound on a single transport call. A timeout counts as a transport failure.
    pub send_timeout: Duration,
    /// When set, a message that has failed this many times is moved to the
    /// dead-letter list instead of being requeued. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

pub struct Outbox {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn MailTransport>,
    settings: OutboxSettings,
}

impl Outbox {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn MailTransport>,
        settings: OutboxSettings,
    ) -> Self {
        Self {
            store,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &OutboxSettings {
        &self.settings
    }

    /// Stores `mail` and appends its id to the queue.
    ///
    /// The body and the queue entry are two separate writes. If the second fails the
    /// body is left behind without a queue entry and simply expires.
    pub async fn enqueue(&self, mail: OutgoingMail) -> Result<MessageId, OutboxError> {
        mail.validate()?;
        let message = QueuedMessage::new(mail);
        let payload = message.encode()?;

        self.store
            .set(&message_key(&message.id), &payload, Some(MESSAGE_TTL))
            .await
            .map_err(OutboxError::QueueWrite)?;
        self.store
            .list_push(QUEUE_KEY, message.id.as_str())
            .await
            .map_err(OutboxError::QueueWrite)?;

        info!("Email added to queue: {}", message.id);
        Ok(message.id)
    }

    /// Pops the oldest queued id and attempts to deliver it.
    ///
    /// The id leaves the queue before delivery is attempted; only a transport failure
    /// puts it back. Store failures are returned as errors.
    pub async fn process_one(&self) -> Result<ProcessOutcome, OutboxError> {
        let id = match self.store.list_pop(QUEUE_KEY).await? {
            Some(id) => MessageId::from(id),
            None => return Ok(ProcessOutcome::Empty),
        };
        let key = message_key(&id);

        let payload = match self.store.get(&key).await? {
            Some(payload) => payload,
            None => {
                warn!("Email data not found: {}", id);
                return Ok(ProcessOutcome::Failed {
                    id,
                    reason: FailureReason::BodyNotFound,
                });
            }
        };

        let message = match QueuedMessage::decode(&payload, &id) {
            Ok(message) => message,
            Err(err) => {
                error!("Dropping malformed email {}: {}", id, err);
                return Ok(ProcessOutcome::Failed {
                    id,
                    reason: FailureReason::Malformed(err.to_string()),
                });
            }
        };

        match self.deliver(&message.mail).await {
            Ok(()) => {
                self.store.delete(&key).await?;
                info!("Email sent successfully: {}", id);
                Ok(ProcessOutcome::Delivered { id })
            }
            Err(err) => self.record_failure(id, message, err).await,
        }
    }

    async fn record_failure(
        &self,
        id: MessageId,
        mut message: QueuedMessage,
        err: TransportError,
    ) -> Result<ProcessOutcome, OutboxError> {
        if let Some(max_attempts) = self.settings.max_attempts {
            message.attempts += 1;
            self.store
                .set(&message_key(&id), &message.encode()?, Some(MESSAGE_TTL))
                .await?;

            if message.attempts >= max_attempts {
                self.store.list_push(DEAD_LETTER_KEY, id.as_str()).await?;
                error!(
                    "Email {} dead-lettered after {} attempts: {}",
                    id, message.attempts, err
                );
                return Ok(ProcessOutcome::DeadLettered {
                    id,
                    attempts: message.attempts,
                });
            }
        }

        self.store.list_push(QUEUE_KEY, id.as_str()).await?;
        warn!("Failed email added back to queue: {} ({})", id, err);
        Ok(ProcessOutcome::Failed {
            id,
            reason: FailureReason::Transport(err.0),
        })
    }

    /// Sends `mail` right away without touching the queue. Nothing is retried.
    pub async fn send_immediate(&self, mail: OutgoingMail) -> Result<(), OutboxError> {
        mail.validate()?;
        self.deliver(&mail).await.map_err(|err| {
            error!("Error sending email: {}", err);
            OutboxError::Transport(err)
        })?;
        info!("Email sent successfully");
        Ok(())
    }

    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        match timeout(self.settings.send_timeout, self.transport.send(mail)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(format!(
                "timed out after {:?}",
                self.settings.send_timeout
            ))),
        }
    }

    /// Queued ids in the order `process_one` will serve them.
    pub async fn pending(&self) -> Result<Vec<MessageId>, OutboxError> {
        let mut ids = self.store.list_range(QUEUE_KEY, 0, -1).await?;
        ids.reverse();
        Ok(ids.into_iter().map(MessageId::from).collect())
    }

    /// Dead-lettered ids, oldest first.
    pub async fn dead_letters(&self) -> Result<Vec<MessageId>, OutboxError> {
        let mut ids = self.store.list_range(DEAD_LETTER_KEY, 0, -1).await?;
        ids.reverse();
        Ok(ids.into_iter().map(MessageId::from).collect())
    }

    /// Calls `process_one` at most once per message queued when the drain starts,
    /// capped at `limit`, stopping early if the queue reports empty.
    ///
    /// A requeued id is immediately poppable again, so bounding the run by the
    /// starting queue length gives each message at most one attempt per drain.
    pub async fn drain(&self, limit: usize) -> Result<DrainReport, OutboxError> {
        let queued = self.store.list_len(QUEUE_KEY).await?;
        let mut report = DrainReport::default();
        for _ in 0..limit.min(queued) {
            match self.process_one().await? {
                ProcessOutcome::Empty => break,
                ProcessOutcome::Delivered { .. } => report.delivered += 1,
                ProcessOutcome::Failed { .. } => report.failed += 1,
                ProcessOutcome::DeadLettered { .. } => report.dead_lettered += 1,
            }
        }
        Ok(report)
    }
}

/// Drains the outbox every `every`, processing at most `batch` messages per tick.
/// Runs until the task is dropped.
pub async fn run_drain_loop(outbox: Arc<Outbox>, every: Duration, batch: usize) {
    info!("Starting outbox drain loop (every {:?})", every);
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        match outbox.drain(batch).await {
            Ok(report) if report.processed() > 0 => info!(
                "Outbox drained: {} delivered, {} failed, {} dead-lettered",
                report.delivered, report.failed, report.dead_lettered
            ),
            Ok(_) => {}
            Err(err) => error!("Outbox processing error: {}", err),
        }
    }
}
