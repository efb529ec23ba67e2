//! Transport strategies for delivering an order downstream.
//!
//! Supports:
//! - Direct: synchronous HTTP POST to the delivery processor
//! - Queue: one message published to a named queue
//! - Staging: one new blob written to the staging store
//!
//! Configuration picks exactly one strategy at startup.

mod direct;
mod queue;
mod staging;

pub use direct::DirectCallTransport;
pub use queue::QueuePublishTransport;
pub use staging::StagingWriteTransport;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::order::OrderPayload;
use crate::queue::{QueueClient, QueueError};
use crate::staging::{StagingError, StagingStore};

/// Errors raised by a single delivery attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport not configured: {0}")]
    Config(String),
}

impl TransportError {
    /// Whether another attempt could succeed.
    ///
    /// Encoding and configuration failures are deterministic; everything
    /// the network or a backend reports is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::Serialization(_)
                | TransportError::Config(_)
                | TransportError::Staging(StagingError::Serialization(_))
        )
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// One way of handing an order to the downstream system.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Make a single delivery attempt.
    async fn attempt(&self, order_id: &str, payload: &OrderPayload) -> Result<()>;

    /// Strategy name for logs and failure reports.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Configuration
// ============================================================================

/// Transport type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Direct HTTP call to the delivery processor.
    #[default]
    Direct,
    /// Publish to the configured queue.
    Queue,
    /// Write to the staging store.
    Staging,
}

impl TransportType {
    /// Attempts made when `retry.max_attempts` is not configured.
    ///
    /// Only the direct call retries by default.
    pub fn default_max_attempts(&self) -> u32 {
        match self {
            TransportType::Direct => 3,
            TransportType::Queue | TransportType::Staging => 1,
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Transport type discriminator.
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    /// Delivery processor URL (required for `direct`).
    pub endpoint: Option<String>,
    /// API key appended to the endpoint as a query parameter.
    pub api_key: Option<String>,
    /// Query parameter name carrying the API key.
    pub api_key_param: String,
    /// Per-attempt network timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_type: TransportType::default(),
            endpoint: None,
            api_key: None,
            api_key_param: "code".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the configured transport.
///
/// Only the collaborator the selected strategy needs is consulted.
pub fn init_transport(
    config: &TransportConfig,
    queue: &Arc<dyn QueueClient>,
    queue_name: &str,
    staging: &Arc<dyn StagingStore>,
) -> Result<Arc<dyn Transport>> {
    match config.transport_type {
        TransportType::Direct => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                TransportError::Config("transport.endpoint is required for direct".to_string())
            })?;
            info!(endpoint = %endpoint, "Transport: direct");
            let transport = DirectCallTransport::new(
                endpoint,
                config
                    .api_key
                    .as_deref()
                    .map(|key| (config.api_key_param.as_str(), key)),
                config.timeout(),
            )?;
            Ok(Arc::new(transport))
        }
        TransportType::Queue => {
            info!(queue = %queue_name, backend = queue.backend(), "Transport: queue");
            Ok(Arc::new(QueuePublishTransport::new(
                Arc::clone(queue),
                queue_name,
            )))
        }
        TransportType::Staging => {
            info!(
                container = %staging.container(),
                backend = staging.backend(),
                "Transport: staging"
            );
            Ok(Arc::new(StagingWriteTransport::new(Arc::clone(staging))))
        }
    }
}
