//! Staging-store delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Result, Transport};
use crate::order::OrderPayload;
use crate::staging::{stage_payload, StagingStore, ORDER_BLOB_PREFIX};

/// Writes the order as a new blob in the staging store.
///
/// Not idempotent: every attempt gets a fresh timestamped name, so a
/// retry after a partial failure can leave two blobs for one order.
pub struct StagingWriteTransport {
    store: Arc<dyn StagingStore>,
}

impl StagingWriteTransport {
    pub fn new(store: Arc<dyn StagingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Transport for StagingWriteTransport {
    async fn attempt(&self, order_id: &str, payload: &OrderPayload) -> Result<()> {
        let blob = stage_payload(self.store.as_ref(), ORDER_BLOB_PREFIX, order_id, payload).await?;
        debug!(
            container = %blob.container,
            blob = %blob.name,
            order_id = %order_id,
            "Order written to staging"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "staging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::InMemoryStagingStore;
    use crate::transport::TransportError;

    fn payload() -> OrderPayload {
        OrderPayload::from_slice(br#"{"orderId":"o-1","qty":2}"#).unwrap()
    }

    #[tokio::test]
    async fn test_writes_new_blob_per_attempt() {
        let store = Arc::new(InMemoryStagingStore::new("outbound-orders"));
        let transport = StagingWriteTransport::new(store.clone());

        transport.attempt("o-1", &payload()).await.unwrap();
        transport.attempt("o-1", &payload()).await.unwrap();

        let names = store.blob_names().await;
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert!(names.iter().all(|n| n.starts_with("order-")));
    }

    #[tokio::test]
    async fn test_write_failure_is_retryable() {
        let store = Arc::new(InMemoryStagingStore::new("outbound-orders"));
        store.set_fail_writes(true).await;
        let transport = StagingWriteTransport::new(store);

        let err = transport.attempt("o-1", &payload()).await.unwrap_err();

        assert!(matches!(err, TransportError::Staging(_)));
        assert!(err.is_retryable());
    }
}
