//! Out-of-band fallback notification.
//!
//! When delivery exhausts its retries the dispatcher sends a
//! [`FailureReport`] to a fallback channel so a person or a secondary
//! process can recover the order. Notification is best-effort: the
//! dispatcher logs a failed notification and carries on.

mod webhook;

pub use webhook::{WebhookNotifier, WebhookNotifierConfig};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::order::OrderPayload;

/// Errors that can occur while notifying the fallback channel.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Notifier not configured: {0}")]
    Config(String),
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Report describing an order whose delivery was given up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub order_id: String,
    /// The payload as it was dispatched, identifier included.
    pub payload: OrderPayload,
    /// Last error observed.
    pub error: String,
    pub attempts: u32,
    pub strategy: String,
    pub failed_at: DateTime<Utc>,
}

/// Fallback channel for failed dispatches.
#[async_trait]
pub trait FallbackNotifier: Send + Sync {
    async fn notify(&self, report: &FailureReport) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Notifier used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl FallbackNotifier for DisabledNotifier {
    async fn notify(&self, report: &FailureReport) -> Result<()> {
        debug!(
            order_id = %report.order_id,
            "Fallback webhook not set, skipping notification"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fallback configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Webhook receiving failure reports. Notification is skipped if unset.
    pub webhook_url: Option<String>,
    /// Request timeout in seconds. Also bounds how long a dispatch waits
    /// on the notifier.
    pub timeout_secs: u64,
    /// Extra headers sent with every report, e.g. an API key.
    pub headers: HashMap<String, String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
            headers: HashMap::new(),
        }
    }
}

impl FallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the notifier for the configured fallback channel.
pub fn init_notifier(config: &FallbackConfig) -> Result<Arc<dyn FallbackNotifier>> {
    match config.webhook_url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            info!(url = %url, "FallbackNotifier: webhook");
            let webhook = config.headers.iter().fold(
                WebhookNotifierConfig::default()
                    .with_url(url.to_string())
                    .with_timeout(config.timeout()),
                |webhook, (key, value)| webhook.with_header(key.clone(), value.clone()),
            );
            let notifier = WebhookNotifier::new(webhook)?;
            Ok(Arc::new(notifier))
        }
        None => {
            info!("FallbackNotifier: disabled (webhook Not set)");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> FailureReport {
        FailureReport {
            order_id: "o-1".to_string(),
            payload: OrderPayload::from_slice(br#"{"orderId":"o-1","sku":"A1"}"#).unwrap(),
            error: "HTTP 503".to_string(),
            attempts: 3,
            strategy: "direct".to_string(),
            failed_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(value["orderId"], "o-1");
        assert_eq!(value["attempts"], 3);
        assert_eq!(value["strategy"], "direct");
        assert_eq!(value["payload"], json!({"orderId": "o-1", "sku": "A1"}));
        assert!(value["failedAt"].is_string());
    }

    #[tokio::test]
    async fn test_disabled_notifier_succeeds() {
        assert!(DisabledNotifier.notify(&report()).await.is_ok());
    }

    #[test]
    fn test_init_without_url_is_disabled() {
        let notifier = init_notifier(&FallbackConfig::default()).unwrap();
        assert_eq!(notifier.name(), "disabled");

        let empty = FallbackConfig {
            webhook_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(init_notifier(&empty).unwrap().name(), "disabled");
    }

    #[test]
    fn test_init_with_url_is_webhook() {
        let config = FallbackConfig {
            webhook_url: Some("https://hooks.example.com/orders".to_string()),
            ..Default::default()
        };
        assert_eq!(init_notifier(&config).unwrap().name(), "webhook");
    }
}
