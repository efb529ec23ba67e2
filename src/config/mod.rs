//! Configuration for the order dispatch service.
//!
//! Sources, later overriding earlier:
//! 1. `order-dispatch.yaml` in the working directory (optional)
//! 2. File passed on the command line
//! 3. File named by `DISPATCH_CONFIG`
//! 4. `DISPATCH__SECTION__KEY` environment variables
//! 5. Flat deployment variables (`DELIVERY_PROCESSOR_URL`, `QUEUE_NAME`, ...)

mod server;

pub use server::ServerConfig;

use serde::Deserialize;
use tracing::info;

use crate::dispatch::{RetryConfig, RetryPolicy};
use crate::documents::DocumentsConfig;
use crate::fallback::FallbackConfig;
use crate::queue::QueueConfig;
use crate::staging::StagingConfig;
use crate::transport::TransportConfig;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "order-dispatch.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DISPATCH_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DISPATCH";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DISPATCH_LOG";
/// Environment variable selecting the log format (`json` or plain).
pub const LOG_FORMAT_ENV_VAR: &str = "DISPATCH_LOG_FORMAT";

/// Environment variable for bind host.
pub const HOST_ENV_VAR: &str = "HOST";
/// Environment variable for server port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable selecting the transport (direct/queue/staging).
pub const TRANSPORT_ENV_VAR: &str = "DISPATCH_TRANSPORT";
/// Environment variable for the delivery processor endpoint.
pub const DELIVERY_PROCESSOR_URL_ENV_VAR: &str = "DELIVERY_PROCESSOR_URL";
/// Environment variable for the delivery processor API key.
pub const DELIVERY_PROCESSOR_API_KEY_ENV_VAR: &str = "DELIVERY_PROCESSOR_API_KEY";
/// Environment variable overriding the attempt budget.
pub const MAX_ATTEMPTS_ENV_VAR: &str = "DISPATCH_MAX_ATTEMPTS";
/// Environment variable for the queue name.
pub const QUEUE_NAME_ENV_VAR: &str = "QUEUE_NAME";
/// Environment variable for the queue connection string.
pub const QUEUE_CONNECTION_STRING_ENV_VAR: &str = "QUEUE_CONNECTION_STRING";
/// Environment variable for the staging container.
pub const STAGING_CONTAINER_ENV_VAR: &str = "STAGING_CONTAINER";
/// Environment variable for the fallback webhook.
pub const FALLBACK_WEBHOOK_URL_ENV_VAR: &str = "FALLBACK_WEBHOOK_URL";
/// Environment variable for the document store endpoint.
pub const DOCUMENT_STORE_ENDPOINT_ENV_VAR: &str = "DOCUMENT_STORE_ENDPOINT";
/// Environment variable for the document store key.
pub const DOCUMENT_STORE_KEY_ENV_VAR: &str = "DOCUMENT_STORE_KEY";

/// Flat environment variables and the config key each one overrides.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    (HOST_ENV_VAR, "server.host"),
    (PORT_ENV_VAR, "server.port"),
    (TRANSPORT_ENV_VAR, "transport.type"),
    (DELIVERY_PROCESSOR_URL_ENV_VAR, "transport.endpoint"),
    (DELIVERY_PROCESSOR_API_KEY_ENV_VAR, "transport.api_key"),
    (MAX_ATTEMPTS_ENV_VAR, "retry.max_attempts"),
    (QUEUE_NAME_ENV_VAR, "queue.name"),
    (QUEUE_CONNECTION_STRING_ENV_VAR, "queue.connection_string"),
    (STAGING_CONTAINER_ENV_VAR, "staging.container"),
    (FALLBACK_WEBHOOK_URL_ENV_VAR, "fallback.webhook_url"),
    (DOCUMENT_STORE_ENDPOINT_ENV_VAR, "documents.endpoint"),
    (DOCUMENT_STORE_KEY_ENV_VAR, "documents.key"),
];

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Delivery transport.
    pub transport: TransportConfig,
    /// Retry budget and delay.
    pub retry: RetryConfig,
    /// Queue used by the queue transport.
    pub queue: QueueConfig,
    /// Staging store used for reservations, the staging transport and
    /// undelivered orders.
    pub staging: StagingConfig,
    /// Fallback notification channel.
    pub fallback: FallbackConfig,
    /// Document store for the deliveries endpoint.
    pub documents: DocumentsConfig,
}

impl Config {
    /// Load configuration from files and environment.
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        for (var, key) in FLAT_ENV_OVERRIDES {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Retry policy for the configured transport.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(
            &self.retry,
            self.transport.transport_type,
            self.transport.timeout(),
        )
    }

    /// Log the effective configuration without secrets.
    pub fn log_summary(&self) {
        let policy = self.retry_policy();
        info!(
            addr = %self.server.addr(),
            transport = ?self.transport.transport_type,
            endpoint = %display_or_unset(self.transport.endpoint.as_deref()),
            api_key = %mask(self.transport.api_key.as_deref()),
            max_attempts = policy.max_attempts(),
            base_delay_ms = policy.base_delay().as_millis() as u64,
            attempt_timeout_secs = policy.attempt_timeout().as_secs(),
            "Dispatch configuration"
        );
        info!(
            queue = %self.queue.name,
            queue_connection = %mask(self.queue.connection_string.as_deref()),
            staging = ?self.staging.store_type,
            container = %self.staging.container,
            fallback_webhook = %display_or_unset(self.fallback.webhook_url.as_deref()),
            documents = ?self.documents.store_type,
            documents_key = %mask(self.documents.key.as_deref()),
            "Backend configuration"
        );
    }

    /// Create config for testing: in-memory backends, no delays.
    pub fn for_test() -> Self {
        Self {
            transport: TransportConfig {
                transport_type: crate::transport::TransportType::Staging,
                ..Default::default()
            },
            retry: RetryConfig {
                max_attempts: Some(1),
                base_delay_ms: 0,
            },
            ..Default::default()
        }
    }
}

fn display_or_unset(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("Not set")
}

fn mask(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "****",
        _ => "Not set",
    }
}
