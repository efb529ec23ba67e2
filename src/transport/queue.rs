//! Queue publish delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Result, Transport, TransportError};
use crate::order::OrderPayload;
use crate::queue::{QueueClient, QueueMessage};

/// Publishes the order as one message to a named queue.
///
/// A sender is acquired per attempt and closed afterwards, whatever the
/// send outcome. A retried attempt publishes again, so consumers must
/// tolerate duplicates.
pub struct QueuePublishTransport {
    client: Arc<dyn QueueClient>,
    queue: String,
}

impl QueuePublishTransport {
    pub fn new(client: Arc<dyn QueueClient>, queue: impl Into<String>) -> Self {
        Self {
            client,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl Transport for QueuePublishTransport {
    async fn attempt(&self, order_id: &str, payload: &OrderPayload) -> Result<()> {
        let body = String::from_utf8(payload.to_json()?).map_err(|e| {
            TransportError::Config(format!("Payload is not valid UTF-8: {}", e))
        })?;

        let mut sender = self.client.create_sender(&self.queue).await?;
        let sent = sender
            .send(QueueMessage {
                message_id: order_id.to_string(),
                body,
            })
            .await;

        if let Err(e) = sender.close().await {
            warn!(queue = %self.queue, error = %e, "Failed to close queue sender");
        }

        sent?;
        debug!(queue = %self.queue, order_id = %order_id, "Order message sent to queue");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;

    fn payload() -> OrderPayload {
        OrderPayload::from_slice(br#"{"orderId":"o-1","sku":"A1"}"#).unwrap()
    }

    #[tokio::test]
    async fn test_publishes_one_message() {
        let queue = InMemoryQueue::new();
        let transport = QueuePublishTransport::new(Arc::new(queue.clone()), "outbound-orders");

        transport.attempt("o-1", &payload()).await.unwrap();

        let messages = queue.messages("outbound-orders").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, "o-1");
        let body: serde_json::Value = serde_json::from_str(&messages[0].body).unwrap();
        assert_eq!(body["sku"], "A1");
        assert_eq!(queue.open_senders(), 0);
    }

    #[tokio::test]
    async fn test_sender_released_on_failure() {
        let queue = InMemoryQueue::new();
        queue.set_fail_on_send(true).await;
        let transport = QueuePublishTransport::new(Arc::new(queue.clone()), "outbound-orders");

        let err = transport.attempt("o-1", &payload()).await.unwrap_err();

        assert!(matches!(err, TransportError::Queue(_)));
        assert!(err.is_retryable());
        assert_eq!(queue.open_senders(), 0);
    }

    #[tokio::test]
    async fn test_each_attempt_publishes_again() {
        let queue = InMemoryQueue::new();
        let transport = QueuePublishTransport::new(Arc::new(queue.clone()), "outbound-orders");

        transport.attempt("o-1", &payload()).await.unwrap();
        transport.attempt("o-1", &payload()).await.unwrap();

        assert_eq!(queue.messages("outbound-orders").await.len(), 2);
    }
}
