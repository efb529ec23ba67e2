//! REST API for order intake.
//!
//! Endpoints:
//! - `POST /api/orders/dispatch`: deliver an order through the configured
//!   transport with retry and fallback
//! - `POST /api/orders/deliveries`: record an order for delivery in the
//!   document store
//! - `POST /api/orders/reservations`: stage an order payload as a blob
//! - `GET /api/health`: health check

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::Services;
use crate::dispatch::{DispatchError, DispatchOutcome, Dispatcher};
use crate::documents::DocumentStore;
use crate::order::OrderPayload;
use crate::staging::{stage_payload, StagingStore, ORDER_BLOB_PREFIX};

const INVALID_BODY: &str = "Please pass a valid JSON order in the request body.";

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub documents: Arc<dyn DocumentStore>,
    pub staging: Arc<dyn StagingStore>,
    /// Root token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(services: &Services, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher: Arc::clone(&services.dispatcher),
            documents: Arc::clone(&services.documents),
            staging: Arc::clone(&services.staging),
            shutdown,
        }
    }
}

type Response = (StatusCode, String);

/// Serve `app` on `addr` until `shutdown` is cancelled.
pub async fn serve(
    app: Router,
    addr: &str,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "order dispatch API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("order dispatch API stopped");
    Ok(())
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/orders/dispatch", post(dispatch_order))
        .route("/api/orders/deliveries", post(create_delivery))
        .route("/api/orders/reservations", post(create_reservation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}

fn parse_body(body: &[u8]) -> Result<OrderPayload, Response> {
    OrderPayload::from_slice(body).map_err(|e| {
        warn!(error = %e, "Rejected order body");
        (StatusCode::BAD_REQUEST, INVALID_BODY.to_string())
    })
}

async fn dispatch_order(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    let cancel = state.shutdown.child_token();
    match state.dispatcher.dispatch(payload, &cancel).await {
        Ok(DispatchOutcome::Delivered { order_id, .. }) => {
            (StatusCode::OK, format!("Order {} dispatched", order_id))
        }
        Ok(DispatchOutcome::StagedAfterFailure { order_id, .. }) => (
            StatusCode::OK,
            format!("Order {} accepted for deferred delivery", order_id),
        ),
        Err(DispatchError::Cancelled { .. }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Order dispatch cancelled".to_string(),
        ),
        Err(e) => {
            error!(error = %e, "Order dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to dispatch order {}", e.order_id()),
            )
        }
    }
}

async fn create_delivery(State(state): State<AppState>, body: Bytes) -> Response {
    let mut payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    payload.ensure_order_id();

    match state.documents.create(&payload).await {
        Ok(created) => {
            info!(id = %created.id, backend = state.documents.backend(), "Order for delivery created");
            (
                StatusCode::OK,
                format!("Order for delivery created successfully: {}", created.id),
            )
        }
        Err(e) => {
            error!(error = %e, "Failed to create order for delivery");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create order".to_string(),
            )
        }
    }
}

async fn create_reservation(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let order_id = payload.order_id().unwrap_or_default();

    match stage_payload(state.staging.as_ref(), ORDER_BLOB_PREFIX, &order_id, &payload).await {
        Ok(blob) => {
            info!(container = %blob.container, blob = %blob.name, "Order reservation uploaded");
            (
                StatusCode::OK,
                format!(
                    "Successfully created and uploaded order with name: {}",
                    blob.name
                ),
            )
        }
        Err(e) => {
            error!(error = %e, "Failed to upload order reservation");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to upload order".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RetryPolicy;
    use crate::documents::InMemoryDocumentStore;
    use crate::fallback::DisabledNotifier;
    use crate::staging::InMemoryStagingStore;
    use crate::transport::{StagingWriteTransport, Transport, TransportError};
    use async_trait::async_trait;
    use axum::body::Body;
    use http::Request;
    use tower::ServiceExt;

    struct AlwaysFails;

    #[async_trait]
    impl Transport for AlwaysFails {
        async fn attempt(
            &self,
            _order_id: &str,
            _payload: &OrderPayload,
        ) -> crate::transport::Result<()> {
            Err(TransportError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "always-fails"
        }
    }

    struct Harness {
        state: AppState,
        staging: Arc<InMemoryStagingStore>,
        documents: Arc<InMemoryDocumentStore>,
    }

    fn harness(transport: Option<Arc<dyn Transport>>) -> Harness {
        let staging = Arc::new(InMemoryStagingStore::new("staging"));
        let documents = Arc::new(InMemoryDocumentStore::new());
        let transport: Arc<dyn Transport> = match transport {
            Some(transport) => transport,
            None => Arc::new(StagingWriteTransport::new(staging.clone())),
        };
        let dispatcher = Dispatcher::new(
            transport,
            RetryPolicy::single_attempt(),
            Arc::new(DisabledNotifier),
            staging.clone(),
        );
        Harness {
            state: AppState {
                dispatcher: Arc::new(dispatcher),
                documents: documents.clone(),
                staging: staging.clone(),
                shutdown: CancellationToken::new(),
            },
            staging,
            documents,
        }
    }

    async fn post(state: AppState, uri: &str, body: &str) -> (StatusCode, String) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_rest_health() {
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let resp = router(harness(None).state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dispatch_delivered() {
        let h = harness(None);

        let (status, body) = post(h.state, "/api/orders/dispatch", r#"{"orderId":"o-1"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Order o-1 dispatched");
        let names = h.staging.blob_names().await;
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("order-"));
    }

    #[tokio::test]
    async fn test_dispatch_staged_after_failure() {
        let h = harness(Some(Arc::new(AlwaysFails) as Arc<dyn Transport>));

        let (status, body) = post(h.state, "/api/orders/dispatch", r#"{"orderId":"o-2"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Order o-2 accepted for deferred delivery");
        let names = h.staging.blob_names().await;
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("undelivered-order-"));
    }

    #[tokio::test]
    async fn test_dispatch_staging_failure_is_500() {
        let h = harness(Some(Arc::new(AlwaysFails) as Arc<dyn Transport>));
        h.staging.set_fail_writes(true).await;

        let (status, body) = post(h.state, "/api/orders/dispatch", r#"{"orderId":"o-3"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to dispatch order o-3");
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_503() {
        let h = harness(None);
        h.state.shutdown.cancel();

        let (status, body) = post(h.state, "/api/orders/dispatch", r#"{"orderId":"o-4"}"#).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "Order dispatch cancelled");
        assert_eq!(h.staging.blob_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_bodies_rejected() {
        for uri in [
            "/api/orders/dispatch",
            "/api/orders/deliveries",
            "/api/orders/reservations",
        ] {
            for body in ["", "not json", "[1,2]"] {
                let (status, text) = post(harness(None).state, uri, body).await;
                assert_eq!(status, StatusCode::BAD_REQUEST, "{} {:?}", uri, body);
                assert_eq!(text, INVALID_BODY);
            }
        }
    }

    #[tokio::test]
    async fn test_delivery_created() {
        let h = harness(None);

        let (status, body) =
            post(h.state, "/api/orders/deliveries", r#"{"id":"d-1","sku":"A1"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Order for delivery created successfully: d-1");
        let stored = h.documents.get("d-1").await.unwrap();
        assert!(stored.order_id().is_some());
    }

    #[tokio::test]
    async fn test_delivery_conflict_is_500() {
        let h = harness(None);
        post(h.state.clone(), "/api/orders/deliveries", r#"{"id":"d-1"}"#).await;

        let (status, body) = post(h.state, "/api/orders/deliveries", r#"{"id":"d-1"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to create order");
    }

    #[tokio::test]
    async fn test_reservation_uploaded() {
        let h = harness(None);

        let (status, body) =
            post(h.state, "/api/orders/reservations", r#"{"orderId":"r-1","qty":1}"#).await;

        assert_eq!(status, StatusCode::OK);
        let name = body
            .strip_prefix("Successfully created and uploaded order with name: ")
            .unwrap();
        assert!(name.starts_with("order-"));
        assert!(name.contains("-r-1-"));
        let stored: serde_json::Value =
            serde_json::from_slice(&h.staging.blob(name).await.unwrap()).unwrap();
        assert_eq!(stored, serde_json::json!({"orderId": "r-1", "qty": 1}));
    }

    #[tokio::test]
    async fn test_reservation_failure_is_500() {
        let h = harness(None);
        h.staging.set_fail_writes(true).await;

        let (status, body) = post(h.state, "/api/orders/reservations", r#"{"orderId":"r-2"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to upload order");
    }
}
