//! Message queue for asynchronous order dispatch.
//!
//! This module contains:
//! - `QueueClient` trait: long-lived, shared connection that hands out senders
//! - `QueueSender` trait: short-lived sender scoped to a single publish
//! - Queue configuration types
//! - Implementations: in-memory, AWS SQS

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

mod memory;
#[cfg(feature = "sqs")]
pub mod sqs;

pub use memory::InMemoryQueue;
#[cfg(feature = "sqs")]
pub use sqs::SqsQueue;

// ============================================================================
// Traits
// ============================================================================

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors that can occur during queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Sender already closed")]
    Closed,
}

/// One message published to a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Application-level message id (the order id).
    pub message_id: String,
    /// JSON body.
    pub body: String,
}

/// Shared queue connection.
///
/// Implementations must be safe for concurrent use: every dispatch call
/// creates its own sender from the same client.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Acquire a sender bound to `queue`.
    async fn create_sender(&self, queue: &str) -> Result<Box<dyn QueueSender>>;

    /// Release the underlying connection at process shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for logging.
    fn backend(&self) -> &'static str;
}

/// Sender scoped to a single publish.
///
/// Callers must `close` the sender once they are done with it, whether the
/// send succeeded or not. Dropping an unclosed sender still releases it.
#[async_trait]
pub trait QueueSender: Send {
    async fn send(&mut self, message: QueueMessage) -> Result<()>;

    async fn close(self: Box<Self>) -> Result<()>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Queue type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    /// In-process queue (development, tests).
    #[default]
    Memory,
    /// AWS SQS (requires `sqs` feature).
    #[cfg(feature = "sqs")]
    Sqs,
}

/// Queue configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue type discriminator.
    #[serde(rename = "type")]
    pub queue_type: QueueType,
    /// Name of the queue orders are published to.
    pub name: String,
    /// Backend connection string (SQS: custom endpoint URL).
    pub connection_string: Option<String>,
    /// AWS region for SQS. Uses the default provider chain if not set.
    pub region: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_type: QueueType::default(),
            name: "order-dispatch".to_string(),
            connection_string: None,
            region: None,
        }
    }
}

/// Initialize a queue client based on configuration.
pub async fn init_queue(config: &QueueConfig) -> Result<Arc<dyn QueueClient>> {
    match config.queue_type {
        QueueType::Memory => {
            info!(queue = %config.name, "Queue: memory");
            Ok(Arc::new(InMemoryQueue::new()))
        }
        #[cfg(feature = "sqs")]
        QueueType::Sqs => {
            info!(
                queue = %config.name,
                region = ?config.region,
                endpoint = ?config.connection_string,
                "Queue: sqs"
            );
            let client =
                SqsQueue::new(config.region.as_deref(), config.connection_string.as_deref()).await;
            Ok(Arc::new(client))
        }
    }
}
