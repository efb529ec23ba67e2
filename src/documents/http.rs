//! Document store reached over HTTP.
//!
//! POSTs each document to a collection endpoint, authenticating with an
//! `x-api-key` header, and reads the assigned id from the JSON response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{CreatedDocument, DocumentStore, DocumentStoreError, Result};
use crate::order::OrderPayload;

const API_KEY_HEADER: &str = "x-api-key";

pub struct HttpDocumentStore {
    client: Client,
    endpoint: String,
    key: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(endpoint: &str, key: Option<&str>, timeout: Duration) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(DocumentStoreError::Config(
                "Document store endpoint not configured".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            key: key.map(str::to_string),
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create(&self, item: &OrderPayload) -> Result<CreatedDocument> {
        let mut request = self.client.post(&self.endpoint).json(item);
        if let Some(key) = &self.key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentStoreError::Conflict(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentStoreError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let value: serde_json::Value = response.json().await?;
        let id = match value.get(super::DOCUMENT_ID_FIELD) {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id.clone(),
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => return Err(DocumentStoreError::MissingId),
        };

        debug!(endpoint = %self.endpoint, id = %id, "Document created");
        Ok(CreatedDocument { id })
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}
