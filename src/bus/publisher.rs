//! Core message and queue traits.

use serde::Serialize;
use thiserror::Error;

/// A message carried by the queue.
///
/// `payload` is opaque to the queue; for ingestion it holds a JSON
/// notification envelope. `receive_count` is maintained by the queue, not the
/// sender.
#[derive(Clone, Debug)]
pub struct Event {
    pub id: String,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub metadata: Option<Vec<(String, String)>>,
    /// Deliveries so far, this one included. Zero until first received.
    pub receive_count: u32,
}

impl Event {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload,
            metadata: None,
            receive_count: 0,
        }
    }

    /// Message whose payload is `body` serialized as JSON.
    pub fn json<T: Serialize>(
        id: impl Into<String>,
        event_type: impl Into<String>,
        body: &T,
    ) -> Result<Self, PublishError> {
        serde_json::to_vec(body)
            .map(|bytes| Self::new(id, event_type, bytes))
            .map_err(|e| PublishError::SerializationFailed(e.to_string()))
    }

    /// Message with a UTF-8 text payload.
    pub fn text(id: impl Into<String>, event_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(id, event_type, body.into().into_bytes())
    }

    /// Attach a header.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let headers = self.metadata.get_or_insert_with(Vec::new);
        headers.push((key.into(), value.into()));
        self
    }

    /// First header named `key`.
    pub fn meta(&self, key: &str) -> Option<&str> {
        let headers = self.metadata.as_deref()?;
        headers
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    /// Payload as text, when it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Failure of a queue call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("queue unreachable: {0}")]
    ConnectionFailed(String),
    #[error("message could not be serialized: {0}")]
    SerializationFailed(String),
    #[error("queue rejected the message: {0}")]
    Rejected(String),
    /// Ack or nack for a message that is not in flight.
    #[error("no in-flight message {0}")]
    UnknownReceipt(String),
    #[error("queue call timed out")]
    Timeout,
}

/// What the queue did with a rejected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The message will be delivered again.
    Redelivered,
    /// The receive budget is spent; the message moved to the dead-letter queue.
    DeadLettered,
}

/// Producer side of a queue.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: Event) -> Result<(), PublishError>;
}

/// Pull-based consumer side of a queue with at-least-once delivery.
pub trait Subscriber: Send + Sync {
    /// Poll for the next message, blocking until one is available or timeout.
    fn poll(&self, timeout_ms: u64) -> Result<Option<Event>, PublishError>;

    /// Acknowledge that a message has been processed; it will not be seen again.
    fn ack(&self, event_id: &str) -> Result<(), PublishError>;

    /// Reject a message. It is redelivered or sent to the dead-letter queue.
    fn nack(&self, event_id: &str, reason: &str) -> Result<Disposition, PublishError>;
}

impl<T: Publisher + ?Sized> Publisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}

impl<T: Subscriber + ?Sized> Subscriber for std::sync::Arc<T> {
    fn poll(&self, timeout_ms: u64) -> Result<Option<Event>, PublishError> {
        (**self).poll(timeout_ms)
    }

    fn ack(&self, event_id: &str) -> Result<(), PublishError> {
        (**self).ack(event_id)
    }

    fn nack(&self, event_id: &str, reason: &str) -> Result<Disposition, PublishError> {
        (**self).nack(event_id, reason)
    }
}
