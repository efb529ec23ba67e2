//! Shared utilities for integration tests.
//!
//! Provides scripted transports, recording notifiers and a local HTTP
//! server standing in for the delivery processor, webhook and document
//! store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::Value;

use order_dispatch::fallback::{FailureReport, FallbackNotifier, NotificationError};
use order_dispatch::order::OrderPayload;
use order_dispatch::transport::{Transport, TransportError};

/// Build a payload from a JSON object literal.
pub fn payload(value: Value) -> OrderPayload {
    match value {
        Value::Object(fields) => OrderPayload::new(fields),
        other => panic!("payload must be a JSON object, got {}", other),
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport that fails a fixed number of times, then succeeds.
///
/// Records the payload handed to every attempt.
pub struct ScriptedTransport {
    failures: usize,
    seen: Mutex<Vec<OrderPayload>>,
}

impl ScriptedTransport {
    pub fn failing_times(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_times(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<OrderPayload> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attempt(
        &self,
        _order_id: &str,
        payload: &OrderPayload,
    ) -> order_dispatch::transport::Result<()> {
        let call = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(payload.clone());
            seen.len()
        };
        if call <= self.failures {
            Err(TransportError::Status {
                status: 503,
                body: format!("attempt {} rejected", call),
            })
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Notifier that records every report and optionally fails.
#[derive(Default)]
pub struct CountingNotifier {
    fail: bool,
    reports: Mutex<Vec<FailureReport>>,
}

impl CountingNotifier {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackNotifier for CountingNotifier {
    async fn notify(&self, report: &FailureReport) -> order_dispatch::fallback::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            Err(NotificationError::Status {
                status: 500,
                body: "webhook down".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

// ============================================================================
// Local HTTP server
// ============================================================================

/// Request captured by the local server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub query: HashMap<String, String>,
    pub api_key: Option<String>,
    pub body: Value,
}

/// State of the local server: what it received, and how many requests to
/// reject before accepting.
#[derive(Clone, Default)]
pub struct Recorder {
    requests: Arc<Mutex<Vec<Recorded>>>,
    reject_first: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn rejecting(count: usize) -> Self {
        let recorder = Self::default();
        recorder.reject_first.store(count, Ordering::SeqCst);
        recorder
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(recorder): State<Recorder>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    recorder.requests.lock().unwrap().push(Recorded {
        query,
        api_key: headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    let rejected = recorder
        .reject_first
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if rejected {
        return (StatusCode::INTERNAL_SERVER_ERROR, "try again".to_string());
    }

    let id = body
        .get("id")
        .cloned()
        .unwrap_or_else(|| Value::String("generated-id".to_string()));
    (StatusCode::CREATED, serde_json::json!({ "id": id }).to_string())
}

/// Router accepting POSTs on `/deliver`, `/hook` and `/docs`.
pub fn recording_router(recorder: Recorder) -> Router {
    Router::new()
        .route("/deliver", post(record))
        .route("/hook", post(record))
        .route("/docs", post(record))
        .with_state(recorder)
}

/// Serve `router` on an ephemeral local port; returns the base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
