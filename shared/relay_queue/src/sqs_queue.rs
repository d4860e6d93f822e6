//! SQS work queue implementation
//!
//! Maps the consumer contract onto SQS: acknowledging deletes the message,
//! negative-acknowledging resets its visibility timeout so the broker hands
//! it out again straight away, and replies are published to the queue named
//! in the `ReplyTo` message attribute.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::{Credentials, Region};
use aws_sdk_sqs::types::{Message, MessageAttributeValue, QueueAttributeName};
use aws_sdk_sqs::Client as SqsClient;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::types::{BrokerSettings, Delivery, QueueEvent, ReplyRoute, WorkQueue};

/// Message attribute naming the reply queue URL
pub const REPLY_TO_ATTRIBUTE: &str = "ReplyTo";
/// Message attribute carrying the request/reply correlation id
pub const CORRELATION_ID_ATTRIBUTE: &str = "CorrelationId";

/// Long polling wait for `ReceiveMessage`
const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;
/// How long a received message stays hidden from other consumers
const DEFAULT_VISIBILITY_TIMEOUT: i32 = 60;
/// Retention for non-durable queues, the SQS minimum
const TRANSIENT_RETENTION_SECONDS: &str = "60";
/// SQS caps a single receive at 10 messages
const MAX_BATCH_SIZE: u16 = 10;

#[derive(Debug, Clone)]
struct Consumer {
    queue: String,
    queue_url: String,
    batch_size: i32,
}

/// One consumer session against an SQS endpoint
pub struct SqsWorkQueue {
    settings: BrokerSettings,
    client: Option<SqsClient>,
    queue_urls: HashMap<String, String>,
    consumer: Option<Consumer>,
    buffered: VecDeque<Delivery>,
    wait_time_seconds: i32,
}

impl SqsWorkQueue {
    /// Creates a session that builds its own client on `connect`
    #[must_use]
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            client: None,
            queue_urls: HashMap::new(),
            consumer: None,
            buffered: VecDeque::new(),
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
        }
    }

    /// Creates a session on top of a pre-configured SQS client
    #[must_use]
    pub fn from_client(client: SqsClient, settings: BrokerSettings) -> Self {
        Self {
            client: Some(client),
            ..Self::new(settings)
        }
    }

    /// Overrides the long polling wait, mostly useful for tests
    #[must_use]
    pub fn with_wait_time_seconds(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    async fn build_client(settings: &BrokerSettings) -> SqsClient {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint_url());

        if settings.has_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
                None,
                None,
                "relay-agent",
            ));
        }

        SqsClient::new(&loader.load().await)
    }

    fn client(&self) -> QueueResult<&SqsClient> {
        self.client.as_ref().ok_or(QueueError::NotConnected)
    }

    fn queue_url_for(&self, queue: &str) -> QueueResult<&str> {
        self.queue_urls
            .get(queue)
            .map(String::as_str)
            .ok_or(QueueError::NotConsuming)
    }

    async fn resolve_queue_url(&self, name: &str) -> QueueResult<String> {
        if let Some(url) = self.queue_urls.get(name) {
            return Ok(url.clone());
        }

        let result = self.client()?.get_queue_url().queue_name(name).send().await?;
        result
            .queue_url()
            .map(ToString::to_string)
            .ok_or_else(|| QueueError::MissingQueueUrl(name.to_string()))
    }

    /// Receives one batch into the local buffer
    async fn fill_buffer(&mut self) -> QueueResult<()> {
        let consumer = self.consumer.clone().ok_or(QueueError::NotConsuming)?;

        let result = self
            .client()?
            .receive_message()
            .queue_url(&consumer.queue_url)
            .max_number_of_messages(consumer.batch_size)
            .visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
            .wait_time_seconds(self.wait_time_seconds)
            .message_attribute_names("All")
            .send()
            .await?;

        for message in result.messages() {
            match to_delivery(&consumer.queue, message) {
                Some(delivery) => self.buffered.push_back(delivery),
                None => warn!("Skipping SQS message without receipt handle"),
            }
        }

        Ok(())
    }
}

/// Converts a raw SQS message into a delivery
///
/// Bodies that are not JSON become `Value::Null` so the consumer still gets
/// to finish them.
fn to_delivery(queue: &str, message: &Message) -> Option<Delivery> {
    let receipt_handle = message.receipt_handle()?.to_string();
    let message_id = message.message_id().unwrap_or_default().to_string();

    let payload = message.body().map_or(Value::Null, |body| {
        serde_json::from_str(body).unwrap_or_else(|e| {
            warn!(message_id = %message_id, "Failed to deserialize message body: {}", e);
            Value::Null
        })
    });

    let attribute = |name: &str| {
        message
            .message_attributes()
            .and_then(|attributes| attributes.get(name))
            .and_then(MessageAttributeValue::string_value)
            .map(ToString::to_string)
    };

    let reply_route = attribute(REPLY_TO_ATTRIBUTE).map(|reply_to| ReplyRoute {
        reply_to,
        correlation_id: attribute(CORRELATION_ID_ATTRIBUTE).unwrap_or_else(|| message_id.clone()),
    });

    Some(Delivery {
        queue: queue.to_string(),
        message_id,
        receipt_handle,
        reply_route,
        payload,
    })
}

#[async_trait]
impl WorkQueue for SqsWorkQueue {
    async fn connect(&mut self) -> QueueResult<()> {
        if self.client.is_none() {
            self.client = Some(Self::build_client(&self.settings).await);
        }

        // SQS is connectionless, a cheap call proves the endpoint and credentials work
        self.client()?.list_queues().max_results(1).send().await?;

        info!("Connected to queue server at {}", self.settings.endpoint_url());
        Ok(())
    }

    async fn create_queue(&mut self, name: &str, durable: bool) -> QueueResult<()> {
        let mut request = self.client()?.create_queue().queue_name(name);
        if !durable {
            request = request.attributes(
                QueueAttributeName::MessageRetentionPeriod,
                TRANSIENT_RETENTION_SECONDS,
            );
        }

        let result = request.send().await?;
        let queue_url = result
            .queue_url()
            .ok_or_else(|| QueueError::MissingQueueUrl(name.to_string()))?;

        debug!(queue = name, queue_url, durable, "Declared queue");
        self.queue_urls
            .insert(name.to_string(), queue_url.to_string());
        Ok(())
    }

    async fn register_consumer(&mut self, name: &str, prefetch: u16) -> QueueResult<()> {
        let queue_url = self.resolve_queue_url(name).await?;
        self.queue_urls.insert(name.to_string(), queue_url.clone());

        self.consumer = Some(Consumer {
            queue: name.to_string(),
            queue_url,
            batch_size: i32::from(prefetch.clamp(1, MAX_BATCH_SIZE)),
        });

        debug!(queue = name, prefetch, "Registered consumer");
        Ok(())
    }

    async fn next_event(&mut self) -> QueueEvent {
        loop {
            if let Some(delivery) = self.buffered.pop_front() {
                return QueueEvent::Message(delivery);
            }

            if let Err(e) = self.fill_buffer().await {
                return QueueEvent::Disconnected(e);
            }
        }
    }

    async fn reply(&self, delivery: &Delivery, payload: &Value) -> QueueResult<()> {
        let Some(route) = &delivery.reply_route else {
            debug!(
                message_id = %delivery.message_id,
                "No reply route on message, skipping reply"
            );
            return Ok(());
        };

        let body = serde_json::to_string(payload)?;
        let correlation_id = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(&route.correlation_id)
            .build()
            .map_err(|e| QueueError::InvalidMessage(e.to_string()))?;

        let mut request = self
            .client()?
            .send_message()
            .queue_url(&route.reply_to)
            .message_body(body)
            .message_attributes(CORRELATION_ID_ATTRIBUTE, correlation_id);

        // FIFO reply queues need a group and a deduplication id
        if route.reply_to.ends_with(".fifo") {
            request = request
                .message_group_id(&route.correlation_id)
                .message_deduplication_id(&route.correlation_id);
        }

        request.send().await?;
        Ok(())
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.client()?
            .delete_message()
            .queue_url(self.queue_url_for(&delivery.queue)?)
            .receipt_handle(&delivery.receipt_handle)
            .send()
            .await?;

        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.client()?
            .change_message_visibility()
            .queue_url(self.queue_url_for(&delivery.queue)?)
            .receipt_handle(&delivery.receipt_handle)
            .visibility_timeout(0)
            .send()
            .await?;

        Ok(())
    }
}
