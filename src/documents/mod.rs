//! Document store for orders created for delivery.
//!
//! Each order is stored as one JSON document. The store returns the id it
//! assigned, which the delivery endpoint reports back to the caller.

mod http;
mod memory;

pub use self::http::HttpDocumentStore;
pub use memory::InMemoryDocumentStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::order::OrderPayload;

/// Field a document store reads the document id from.
pub const DOCUMENT_ID_FIELD: &str = "id";

/// Errors from document store operations.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Document already exists: {0}")]
    Conflict(String),

    #[error("Document store response missing id")]
    MissingId,

    #[error("Document store not configured: {0}")]
    Config(String),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedDocument {
    pub id: String,
}

/// Stores order documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a new document; never replaces an existing one.
    async fn create(&self, item: &OrderPayload) -> Result<CreatedDocument>;

    fn backend(&self) -> &'static str;
}

/// Document store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStoreType {
    #[default]
    Memory,
    Http,
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    #[serde(rename = "type")]
    pub store_type: DocumentStoreType,
    /// Collection endpoint, e.g. `https://docs.example.com/orders`.
    pub endpoint: Option<String>,
    /// Value sent in the `x-api-key` header.
    pub key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            store_type: DocumentStoreType::Memory,
            endpoint: None,
            key: None,
            timeout_secs: 10,
        }
    }
}

/// Initialize a document store based on configuration.
pub fn init_document_store(config: &DocumentsConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.store_type {
        DocumentStoreType::Memory => {
            info!("DocumentStore: memory");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
        DocumentStoreType::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    DocumentStoreError::Config("documents.endpoint is required for http".to_string())
                })?;
            info!(endpoint = %endpoint, "DocumentStore: http");
            Ok(Arc::new(HttpDocumentStore::new(
                endpoint,
                config.key.as_deref(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}
