//! Queue test setup utilities

#![allow(dead_code)]

use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sqs::Client as SqsClient;
use relay_queue::BrokerSettings;
use uuid::Uuid;

/// Broker settings pointing at a local `LocalStack` instance
pub fn localstack_settings() -> BrokerSettings {
    BrokerSettings {
        server: "localhost".to_string(),
        username: "test".to_string(),
        password: "test".to_string(),
        region: "us-east-1".to_string(),
    }
}

/// Builds an SQS client for `LocalStack`
pub fn localstack_client() -> SqsClient {
    let settings = localstack_settings();
    let config = aws_sdk_sqs::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .endpoint_url(settings.endpoint_url())
        .credentials_provider(Credentials::new(
            settings.username,
            settings.password,
            None,
            None,
            "relay-queue-tests",
        ))
        .build();

    SqsClient::from_conf(config)
}

/// Test context with a uniquely named work queue and reply queue
pub struct SqsSetup {
    pub sqs_client: SqsClient,
    pub queue_name: String,
    pub reply_queue_url: String,
}

impl SqsSetup {
    /// Creates a reply queue; the work queue is declared by the code under test
    pub async fn new(prefix: &str) -> Self {
        let sqs_client = localstack_client();
        let queue_name = format!("{prefix}-{}", Uuid::new_v4());

        let result = sqs_client
            .create_queue()
            .queue_name(format!("{queue_name}-replies"))
            .send()
            .await
            .expect("Failed to create reply queue");

        let reply_queue_url = result
            .queue_url()
            .expect("Queue URL not returned")
            .to_string();

        Self {
            sqs_client,
            queue_name,
            reply_queue_url,
        }
    }

    /// Queue URL of the work queue, once declared
    pub async fn queue_url(&self) -> String {
        self.sqs_client
            .get_queue_url()
            .queue_name(&self.queue_name)
            .send()
            .await
            .expect("Failed to resolve work queue")
            .queue_url()
            .expect("Queue URL not returned")
            .to_string()
    }
}

impl Drop for SqsSetup {
    fn drop(&mut self) {
        let client = self.sqs_client.clone();
        let queue_name = self.queue_name.clone();
        let reply_queue_url = self.reply_queue_url.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = client.delete_queue().queue_url(&reply_queue_url).send().await;
                if let Ok(result) = client.get_queue_url().queue_name(&queue_name).send().await {
                    if let Some(url) = result.queue_url() {
                        let _ = client.delete_queue().queue_url(url).send().await;
                    }
                }
            });
        }
    }
}
