use async_trait::async_trait;
use serde_json::Value;

use crate::error::{QueueError, QueueResult};

/// Where a reply to a delivery should be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRoute {
    /// Queue URL of the requester's reply queue
    pub reply_to: String,
    /// Correlation id echoed back so the requester can match the reply
    pub correlation_id: String,
}

/// A single message handed to a consumer
///
/// The receipt handle identifies the delivery to the broker. Consumers must
/// finish every delivery with exactly one of ack or nack.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Name of the queue the message was consumed from
    pub queue: String,
    /// Broker-assigned message ID
    pub message_id: String,
    /// Receipt handle for acknowledging the message
    pub receipt_handle: String,
    /// Reply route, if the requester asked for a response
    pub reply_route: Option<ReplyRoute>,
    /// Decoded message body; `Value::Null` when the body was not JSON
    pub payload: Value,
}

/// Events observed by a consumer session
#[derive(Debug)]
pub enum QueueEvent {
    /// A message is ready for processing
    Message(Delivery),
    /// The session lost its connection to the broker
    Disconnected(QueueError),
}

/// Connection settings for a broker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Broker host, or a full endpoint URL
    pub server: String,
    /// Access key; empty means the default credential chain
    pub username: String,
    /// Secret key
    pub password: String,
    /// Region the broker lives in
    pub region: String,
}

impl BrokerSettings {
    /// Returns the endpoint URL for the broker
    ///
    /// A bare host maps to the `LocalStack` port, anything with a scheme is
    /// used as-is.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        if self.server.contains("://") {
            self.server.clone()
        } else {
            format!("http://{}:4566", self.server)
        }
    }

    /// Whether explicit credentials were configured
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Consumer-side contract of the work queue
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Opens the session with the broker
    async fn connect(&mut self) -> QueueResult<()>;

    /// Declares a queue, creating it when missing
    async fn create_queue(&mut self, name: &str, durable: bool) -> QueueResult<()>;

    /// Starts consuming `name`, holding at most `prefetch` unacknowledged messages
    async fn register_consumer(&mut self, name: &str, prefetch: u16) -> QueueResult<()>;

    /// Waits for the next message or a disconnect
    async fn next_event(&mut self) -> QueueEvent;

    /// Publishes `payload` to the requester of `delivery`
    async fn reply(&self, delivery: &Delivery, payload: &Value) -> QueueResult<()>;

    /// Removes `delivery` from the queue
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Returns `delivery` to the queue for redelivery
    async fn nack(&self, delivery: &Delivery) -> QueueResult<()>;
}
