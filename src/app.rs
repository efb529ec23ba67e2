//! Service wiring.
//!
//! Builds every backend from [`Config`] once at startup and hands out
//! shared handles. All handles are `Send + Sync` and safe to use from
//! concurrent requests.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::documents::{init_document_store, DocumentStore, DocumentStoreError};
use crate::fallback::{init_notifier, NotificationError};
use crate::queue::{init_queue, QueueClient, QueueError};
use crate::staging::{init_staging_store, StagingError, StagingStore};
use crate::transport::{init_transport, TransportError};

/// Errors raised while building services.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Transport initialization failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Staging store initialization failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Queue initialization failed: {0}")]
    Queue(#[from] QueueError),

    #[error("Fallback notifier initialization failed: {0}")]
    Notification(#[from] NotificationError),

    #[error("Document store initialization failed: {0}")]
    Documents(#[from] DocumentStoreError),
}

/// Long-lived service handles.
#[derive(Clone)]
pub struct Services {
    pub dispatcher: Arc<Dispatcher>,
    pub documents: Arc<dyn DocumentStore>,
    pub staging: Arc<dyn StagingStore>,
    pub queue: Arc<dyn QueueClient>,
}

impl Services {
    /// Build all services from configuration.
    pub async fn init(config: &Config) -> Result<Self, InitError> {
        let staging = init_staging_store(&config.staging).await?;
        let queue = init_queue(&config.queue).await?;
        let transport = init_transport(&config.transport, &queue, &config.queue.name, &staging)?;
        let notifier = init_notifier(&config.fallback)?;
        let documents = init_document_store(&config.documents)?;

        let dispatcher = Dispatcher::new(transport, config.retry_policy(), notifier, Arc::clone(&staging))
            .with_notify_timeout(config.fallback.timeout());

        info!(
            strategy = dispatcher.strategy(),
            max_attempts = dispatcher.retry_policy().max_attempts(),
            "Services initialized"
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            documents,
            staging,
            queue,
        })
    }

    /// Release backend connections.
    pub async fn shutdown(&self) {
        if let Err(e) = self.queue.close().await {
            warn!(error = %e, "Failed to close queue client");
        }
        info!("Services shut down");
    }
}
