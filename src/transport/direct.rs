//! Direct HTTP delivery to the order processor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::{Result, Transport, TransportError};
use crate::order::OrderPayload;

/// Longest slice of an error response body kept in the error.
const MAX_ERROR_BODY: usize = 200;

/// POSTs the order as JSON to the delivery processor.
///
/// Any non-2xx response or network error fails the attempt. The client is
/// connection-pooled and shared by all concurrent dispatches.
pub struct DirectCallTransport {
    client: Client,
    endpoint: String,
    api_key: Option<(String, String)>,
}

impl DirectCallTransport {
    /// Create a transport for `endpoint`.
    ///
    /// `api_key` is a `(query parameter, key)` pair appended to every call.
    pub fn new(endpoint: &str, api_key: Option<(&str, &str)>, timeout: Duration) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(TransportError::Config(
                "Delivery endpoint is empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.map(|(param, key)| (param.to_string(), key.to_string())),
        })
    }
}

#[async_trait]
impl Transport for DirectCallTransport {
    async fn attempt(&self, order_id: &str, payload: &OrderPayload) -> Result<()> {
        let body = payload.to_json()?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body);

        if let Some((param, key)) = &self.api_key {
            request = request.query(&[(param, key)]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(
                endpoint = %self.endpoint,
                order_id = %order_id,
                status = %status,
                "Delivery processor accepted order"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            endpoint = %self.endpoint,
            order_id = %order_id,
            status = %status,
            "Delivery processor rejected order"
        );
        Err(TransportError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoint_fails() {
        let result = DirectCallTransport::new("", None, Duration::from_secs(1));
        assert!(matches!(result, Err(TransportError::Config(_))));
    }

    #[test]
    fn test_api_key_kept_as_query_pair() {
        let transport = DirectCallTransport::new(
            "http://localhost:8081/api/deliver",
            Some(("code", "secret")),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            transport.api_key,
            Some(("code".to_string(), "secret".to_string()))
        );
        assert_eq!(transport.name(), "direct");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retryable_failure() {
        // Port 9 (discard) is closed on test hosts; connection is refused.
        let transport =
            DirectCallTransport::new("http://127.0.0.1:9/orders", None, Duration::from_secs(2))
                .unwrap();
        let payload = OrderPayload::from_slice(br#"{"orderId":"o-1"}"#).unwrap();

        let err = transport.attempt("o-1", &payload).await.unwrap_err();

        assert!(matches!(err, TransportError::Http(_)));
        assert!(err.is_retryable());
    }
}
