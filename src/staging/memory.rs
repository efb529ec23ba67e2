//! In-memory staging store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, StagingError, StagingStore};

/// In-memory staging store for development and testing.
#[derive(Default)]
pub struct InMemoryStagingStore {
    container: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: RwLock<bool>,
}

impl InMemoryStagingStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            ..Default::default()
        }
    }

    /// Make every subsequent write fail.
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    pub async fn blob(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(name).cloned()
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// All blob names, sorted.
    pub async fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.blobs.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StagingStore for InMemoryStagingStore {
    async fn ensure_container(&self) -> Result<()> {
        Ok(())
    }

    async fn write_blob(&self, name: &str, content: &[u8]) -> Result<()> {
        if *self.fail_writes.read().await {
            return Err(StagingError::WriteFailed(
                "In-memory write failure".to_string(),
            ));
        }

        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(name) {
            return Err(StagingError::AlreadyExists(name.to_string()));
        }
        blobs.insert(name.to_string(), content.to_vec());
        Ok(())
    }

    fn container(&self) -> &str {
        &self.container
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
