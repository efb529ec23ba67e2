//! Order payload handed to the dispatcher.
//!
//! The payload is an opaque JSON object. The only field the service
//! interprets is the order identifier, which is injected when missing so
//! that every payload leaving the dispatcher carries exactly one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Field holding the order identifier.
pub const ORDER_ID_FIELD: &str = "orderId";

/// Errors raised while reading an order payload from raw bytes.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Request body is empty")]
    Empty,

    #[error("Invalid JSON: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("Order payload must be a JSON object")]
    NotAnObject,
}

/// Result type for payload operations.
pub type Result<T> = std::result::Result<T, PayloadError>;

/// One order-for-delivery request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderPayload(Map<String, Value>);

impl OrderPayload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a request body into a payload.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PayloadError::Empty);
        }
        match serde_json::from_slice::<Value>(body)? {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// The order identifier, if one is present.
    ///
    /// Non-empty strings and numbers count as identifiers.
    pub fn order_id(&self) -> Option<String> {
        match self.0.get(ORDER_ID_FIELD) {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Return the order identifier, generating and injecting one if absent.
    pub fn ensure_order_id(&mut self) -> String {
        if let Some(id) = self.order_id() {
            return id;
        }
        let id = Uuid::new_v4().to_string();
        self.0
            .insert(ORDER_ID_FIELD.to_string(), Value::String(id.clone()));
        id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Encode the payload as JSON bytes.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for OrderPayload {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
