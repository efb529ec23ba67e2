//! AWS SQS queue implementation.
//!
//! Each sender resolves the queue URL by name and publishes one message per
//! `send`. The SQS client itself is connection-pooled and shared.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::types::MessageAttributeValue;
use aws_sdk_sqs::Client as SqsClient;
use tracing::{debug, info};

use super::{QueueClient, QueueError, QueueMessage, QueueSender, Result};

/// Message attribute name for the order id.
const ORDER_ID_ATTR: &str = "order_id";

/// AWS SQS queue client.
pub struct SqsQueue {
    sqs: SqsClient,
}

impl SqsQueue {
    /// Create a new SQS client.
    pub async fn new(region: Option<&str>, endpoint_url: Option<&str>) -> Self {
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = region {
            aws_config_builder = aws_config_builder.region(aws_config::Region::new(region.to_string()));
        }

        if let Some(endpoint) = endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;

        info!(region = ?region, endpoint = ?endpoint_url, "Connected to AWS SQS");

        Self {
            sqs: SqsClient::new(&aws_config),
        }
    }

    /// Create with explicit client (for testing).
    pub fn with_client(sqs: SqsClient) -> Self {
        Self { sqs }
    }
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn create_sender(&self, queue: &str) -> Result<Box<dyn QueueSender>> {
        let result = self
            .sqs
            .get_queue_url()
            .queue_name(queue)
            .send()
            .await
            .map_err(|e| QueueError::QueueNotFound(format!("{}: {}", queue, e)))?;

        let queue_url = result
            .queue_url()
            .ok_or_else(|| QueueError::QueueNotFound(format!("{}: no URL returned", queue)))?
            .to_string();

        Ok(Box::new(SqsSender {
            sqs: self.sqs.clone(),
            queue_url: Some(queue_url),
        }))
    }

    fn backend(&self) -> &'static str {
        "sqs"
    }
}

struct SqsSender {
    sqs: SqsClient,
    queue_url: Option<String>,
}

#[async_trait]
impl QueueSender for SqsSender {
    async fn send(&mut self, message: QueueMessage) -> Result<()> {
        let queue_url = self.queue_url.as_deref().ok_or(QueueError::Closed)?;

        let order_id = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(&message.message_id)
            .build()
            .map_err(|e| QueueError::Send(format!("Invalid message attribute: {}", e)))?;

        let output = self
            .sqs
            .send_message()
            .queue_url(queue_url)
            .message_body(message.body)
            .message_attributes(ORDER_ID_ATTR, order_id)
            .send()
            .await
            .map_err(|e| QueueError::Send(format!("SQS send_message failed: {}", e)))?;

        debug!(
            queue_url = %queue_url,
            order_id = %message.message_id,
            sqs_message_id = ?output.message_id(),
            "Published order to SQS"
        );
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.queue_url = None;
        Ok(())
    }
}
