//! HTTP webhook fallback notifier.
//!
//! POSTs the failure report as JSON to a configured endpoint. One request
//! per report; the caller decides what to do with a failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{FailureReport, FallbackNotifier, NotificationError, Result};

/// Webhook notifier configuration.
#[derive(Debug, Clone)]
pub struct WebhookNotifierConfig {
    /// Webhook endpoint URL.
    pub url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Additional headers to include.
    pub headers: Vec<(String, String)>,
}

impl Default for WebhookNotifierConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(10),
            headers: Vec::new(),
        }
    }
}

impl WebhookNotifierConfig {
    /// Set the endpoint URL.
    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.push((key, value));
        self
    }
}

/// Posts failure reports to a webhook.
pub struct WebhookNotifier {
    client: Client,
    config: WebhookNotifierConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookNotifierConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(NotificationError::Config(
                "Webhook URL not configured".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl FallbackNotifier for WebhookNotifier {
    async fn notify(&self, report: &FailureReport) -> Result<()> {
        let mut request = self.client.post(&self.config.url).json(report);

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(
                url = %self.config.url,
                order_id = %report.order_id,
                "Failure report delivered to webhook"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotificationError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderPayload;
    use chrono::Utc;

    #[test]
    fn test_config_defaults() {
        let config = WebhookNotifierConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.url.is_empty());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = WebhookNotifierConfig::default()
            .with_url("https://hooks.example.com/orders".to_string())
            .with_timeout(Duration::from_secs(3))
            .with_header("Authorization".to_string(), "Bearer token".to_string());

        assert_eq!(config.url, "https://hooks.example.com/orders");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.headers.len(), 1);
    }

    #[test]
    fn test_empty_url_fails() {
        let result = WebhookNotifier::new(WebhookNotifierConfig::default());
        assert!(matches!(result, Err(NotificationError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_webhook_returns_error() {
        let notifier = WebhookNotifier::new(
            WebhookNotifierConfig::default()
                .with_url("http://127.0.0.1:9/hook".to_string())
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let report = FailureReport {
            order_id: "o-1".to_string(),
            payload: OrderPayload::default(),
            error: "boom".to_string(),
            attempts: 1,
            strategy: "direct".to_string(),
            failed_at: Utc::now(),
        };

        assert!(matches!(
            notifier.notify(&report).await,
            Err(NotificationError::Http(_))
        ));
    }
}
