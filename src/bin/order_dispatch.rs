//! order-dispatch: order intake and delivery service
//!
//! ## Architecture
//! ```text
//! [HTTP client] -> [REST API :8080] -> [Dispatcher] -> [Transport] -> [Delivery processor]
//!                                           |
//!                                           v (retries exhausted)
//!                                  [Fallback webhook] + [Staging store]
//! ```
//!
//! ## Configuration
//! - DISPATCH_CONFIG: YAML config file path
//! - DISPATCH_TRANSPORT: direct, queue or staging (default: direct)
//! - DELIVERY_PROCESSOR_URL: endpoint for the direct transport
//! - FALLBACK_WEBHOOK_URL: receives failure reports (optional)
//! - DISPATCH_LOG: log filter (default: info)

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use order_dispatch::app::Services;
use order_dispatch::config::Config;
use order_dispatch::handlers::rest::{router, serve, AppState};
use order_dispatch::utils::bootstrap::{cancel_on_shutdown_signal, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    config.log_summary();

    let services = Services::init(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize services");
        e
    })?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(shutdown.clone()));

    info!(version = env!("CARGO_PKG_VERSION"), "starting order-dispatch");

    let app = router(AppState::new(&services, shutdown.clone()));
    let result = serve(app, &config.server.addr(), shutdown.clone()).await;

    shutdown.cancel();
    services.shutdown().await;
    result
}
