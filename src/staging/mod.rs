//! Durable staging of order payloads.
//!
//! Staging is append-only: every write lands under a freshly generated
//! blob name and an existing blob is never overwritten. It serves as the
//! primary path for the staging-write transport and as the last-resort
//! destination when delivery exhausts its retries.
//!
//! ## Storage Backends
//!
//! - `InMemoryStagingStore` - Process-local map (default, tests)
//! - `FilesystemStagingStore` - One directory per container
//! - `S3StagingStore` (feature: s3) - Amazon S3 bucket per container
//!
//! ## Blob Naming
//!
//! ```text
//! {prefix}-{yyyyMMddTHHmmss.fffZ}-{order id}-{8 hex}.json
//! ```

mod config;
mod filesystem;
mod memory;
#[cfg(feature = "s3")]
mod s3;

pub use self::config::{ContainerAccess, StagingConfig, StagingStoreType};
pub use filesystem::FilesystemStagingStore;
pub use memory::InMemoryStagingStore;
#[cfg(feature = "s3")]
pub use s3::S3StagingStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::order::OrderPayload;

/// Blob prefix used when the staging store is the delivery path.
pub const ORDER_BLOB_PREFIX: &str = "order";

/// Blob prefix used when staging after exhausted delivery.
pub const UNDELIVERED_BLOB_PREFIX: &str = "undelivered-order";

/// Fresh names tried before giving up on a write.
const MAX_NAME_ATTEMPTS: usize = 5;

/// Errors that can occur during staging operations.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to create container {container}: {message}")]
    ContainerFailed { container: String, message: String },

    #[error("Failed to write blob: {0}")]
    WriteFailed(String),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No unique blob name after {0} attempts")]
    NameExhausted(usize),
}

/// Result type for staging operations.
pub type Result<T> = std::result::Result<T, StagingError>;

/// A payload written to the staging store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBlob {
    pub container: String,
    pub name: String,
    pub size: usize,
    pub staged_at: DateTime<Utc>,
}

/// Append-only blob storage for order payloads.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Create the container if it does not exist yet.
    ///
    /// Called before every write; implementations only talk to the backend
    /// the first time.
    async fn ensure_container(&self) -> Result<()>;

    /// Write a new blob.
    ///
    /// Fails with `StagingError::AlreadyExists` instead of overwriting.
    async fn write_blob(&self, name: &str, content: &[u8]) -> Result<()>;

    /// Container (directory, bucket) this store writes into.
    fn container(&self) -> &str;

    /// Backend name for logging.
    fn backend(&self) -> &'static str;
}

/// Generate a blob name that is unique with overwhelming probability.
///
/// The timestamp has millisecond precision, so the random suffix is what
/// separates two failures of the same order within one millisecond.
pub fn blob_name(prefix: &str, order_id: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}.json",
        prefix,
        timestamp,
        sanitize_component(order_id),
        &suffix[..8]
    )
}

/// Restrict an order id to characters that are safe in paths and object keys.
fn sanitize_component(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "order".to_string()
    } else {
        sanitized
    }
}

/// Serialize a payload and write it under a new blob name.
pub async fn stage_payload(
    store: &dyn StagingStore,
    prefix: &str,
    order_id: &str,
    payload: &OrderPayload,
) -> Result<StagedBlob> {
    let content = payload.to_json()?;
    store.ensure_container().await?;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = blob_name(prefix, order_id);
        match store.write_blob(&name, &content).await {
            Ok(()) => {
                debug!(
                    container = %store.container(),
                    blob = %name,
                    size = content.len(),
                    backend = store.backend(),
                    "Staged order payload"
                );
                return Ok(StagedBlob {
                    container: store.container().to_string(),
                    name,
                    size: content.len(),
                    staged_at: Utc::now(),
                });
            }
            Err(StagingError::AlreadyExists(existing)) => {
                debug!(blob = %existing, "Blob name taken, generating another");
            }
            Err(e) => return Err(e),
        }
    }

    Err(StagingError::NameExhausted(MAX_NAME_ATTEMPTS))
}

// ============================================================================
// Factory
// ============================================================================

/// Initialize a staging store based on configuration.
pub async fn init_staging_store(config: &StagingConfig) -> Result<Arc<dyn StagingStore>> {
    match config.store_type {
        StagingStoreType::Memory => {
            info!(container = %config.container, "StagingStore: memory");
            Ok(Arc::new(InMemoryStagingStore::new(&config.container)))
        }
        StagingStoreType::Filesystem => {
            info!(
                path = %config.base_path.display(),
                container = %config.container,
                "StagingStore: filesystem"
            );
            Ok(Arc::new(FilesystemStagingStore::new(
                &config.base_path,
                &config.container,
            )))
        }
        #[cfg(feature = "s3")]
        StagingStoreType::S3 => {
            info!(
                bucket = %config.container,
                region = ?config.region,
                endpoint = ?config.endpoint,
                "StagingStore: s3"
            );
            let store = S3StagingStore::new(
                &config.container,
                config.access,
                config.region.as_deref(),
                config.endpoint.as_deref(),
            )
            .await;
            Ok(Arc::new(store))
        }
    }
}
