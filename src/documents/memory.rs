//! In-memory document store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CreatedDocument, DocumentStore, DocumentStoreError, Result, DOCUMENT_ID_FIELD};
use crate::order::OrderPayload;

/// In-memory document store for development and testing.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, OrderPayload>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<OrderPayload> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, item: &OrderPayload) -> Result<CreatedDocument> {
        let id = match item.get(DOCUMENT_ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let mut documents = self.documents.write().await;
        if documents.contains_key(&id) {
            return Err(DocumentStoreError::Conflict(id));
        }
        documents.insert(id.clone(), item.clone());
        Ok(CreatedDocument { id })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_uses_item_id() {
        let store = InMemoryDocumentStore::new();
        let item = OrderPayload::from_slice(br#"{"id":"doc-1","sku":"A1"}"#).unwrap();

        let created = store.create(&item).await.unwrap();

        assert_eq!(created.id, "doc-1");
        assert_eq!(store.get("doc-1").await, Some(item));
    }

    #[tokio::test]
    async fn test_create_assigns_id_when_missing() {
        let store = InMemoryDocumentStore::new();
        let item = OrderPayload::from_slice(br#"{"sku":"A1"}"#).unwrap();

        let a = store.create(&item).await.unwrap();
        let b = store.create(&item).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = InMemoryDocumentStore::new();
        let item = OrderPayload::from_slice(br#"{"id":"doc-1"}"#).unwrap();

        store.create(&item).await.unwrap();
        assert!(matches!(
            store.create(&item).await,
            Err(DocumentStoreError::Conflict(id)) if id == "doc-1"
        ));
    }
}
