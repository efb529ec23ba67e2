//! Order dispatch orchestration.
//!
//! The [`Dispatcher`] owns the delivery pipeline for one order:
//!
//! 1. Make sure the payload carries an order identifier.
//! 2. Run the configured [`Transport`] under the [`RetryPolicy`].
//! 3. When delivery gives up, notify the fallback channel (best-effort,
//!    bounded by a timeout) while staging the payload under an
//!    "undelivered" blob name so nothing is lost.
//!
//! Cancellation is checked before the first attempt and observed during
//! retry waits. A cancelled dispatch never reaches the fallback path.

mod attempt;
mod retry;

pub use attempt::{AttemptOutcome, DispatchAttempt};
pub use retry::{
    RetryConfig, RetryOutcome, RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_ATTEMPTS,
};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::fallback::{FailureReport, FallbackNotifier};
use crate::order::OrderPayload;
use crate::staging::{stage_payload, StagedBlob, StagingError, StagingStore, UNDELIVERED_BLOB_PREFIX};
use crate::transport::{Transport, TransportError};

/// Upper bound on a fallback notification before it is abandoned.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that end a dispatch without a recorded outcome.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch of order {order_id} was cancelled")]
    Cancelled { order_id: String },

    #[error("Order {order_id} failed delivery and could not be staged: {source}")]
    Staging {
        order_id: String,
        #[source]
        source: StagingError,
    },
}

impl DispatchError {
    pub fn order_id(&self) -> &str {
        match self {
            DispatchError::Cancelled { order_id } | DispatchError::Staging { order_id, .. } => {
                order_id
            }
        }
    }
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// How a dispatch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The transport accepted the order.
    Delivered {
        order_id: String,
        attempts: Vec<DispatchAttempt>,
    },
    /// Delivery gave up; the payload was staged for later recovery.
    StagedAfterFailure {
        order_id: String,
        attempts: Vec<DispatchAttempt>,
        blob: StagedBlob,
        error: String,
    },
}

impl DispatchOutcome {
    pub fn order_id(&self) -> &str {
        match self {
            DispatchOutcome::Delivered { order_id, .. }
            | DispatchOutcome::StagedAfterFailure { order_id, .. } => order_id,
        }
    }

    pub fn attempts(&self) -> &[DispatchAttempt] {
        match self {
            DispatchOutcome::Delivered { attempts, .. }
            | DispatchOutcome::StagedAfterFailure { attempts, .. } => attempts,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Delivers orders through a transport with retry and fallback.
///
/// Holds no per-order state, so one instance serves any number of
/// concurrent dispatch calls.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    notifier: Arc<dyn FallbackNotifier>,
    notify_timeout: Duration,
    staging: Arc<dyn StagingStore>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        notifier: Arc<dyn FallbackNotifier>,
        staging: Arc<dyn StagingStore>,
    ) -> Self {
        Self {
            transport,
            retry,
            notifier,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            staging,
        }
    }

    /// Bound the fallback notification. Staging never waits on it.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn strategy(&self) -> &'static str {
        self.transport.name()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Deliver one order.
    ///
    /// Returns `Delivered` on success and `StagedAfterFailure` once retries
    /// are exhausted and the payload has been staged. Errors only when the
    /// call is cancelled or the fallback write itself fails.
    pub async fn dispatch(
        &self,
        mut payload: OrderPayload,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let order_id = payload.ensure_order_id();

        if cancel.is_cancelled() {
            debug!(order_id = %order_id, "Dispatch cancelled before first attempt");
            return Err(DispatchError::Cancelled { order_id });
        }

        debug!(
            order_id = %order_id,
            strategy = self.strategy(),
            max_attempts = self.retry.max_attempts(),
            "Dispatching order"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(order_id = %order_id, "Dispatch cancelled");
                return Err(DispatchError::Cancelled { order_id });
            }
            outcome = self.retry.execute(self.transport.as_ref(), &order_id, &payload) => outcome,
        };

        match outcome {
            RetryOutcome::Delivered { attempts } => {
                info!(
                    order_id = %order_id,
                    strategy = self.strategy(),
                    attempts = attempts.len(),
                    "Order dispatched"
                );
                Ok(DispatchOutcome::Delivered { order_id, attempts })
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                self.fall_back(order_id, payload, attempts, last_error)
                    .await
            }
        }
    }

    async fn fall_back(
        &self,
        order_id: String,
        payload: OrderPayload,
        attempts: Vec<DispatchAttempt>,
        last_error: TransportError,
    ) -> Result<DispatchOutcome> {
        error!(
            order_id = %order_id,
            strategy = self.strategy(),
            attempts = attempts.len(),
            error = %last_error,
            "Order delivery failed, falling back"
        );

        let report = FailureReport {
            order_id: order_id.clone(),
            payload,
            error: last_error.to_string(),
            attempts: attempts.len() as u32,
            strategy: self.strategy().to_string(),
            failed_at: Utc::now(),
        };

        let notified = async {
            match tokio::time::timeout(self.notify_timeout, self.notifier.notify(&report)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    order_id = %order_id,
                    notifier = self.notifier.name(),
                    error = %e,
                    "Fallback notification failed"
                ),
                Err(_) => warn!(
                    order_id = %order_id,
                    notifier = self.notifier.name(),
                    timeout_ms = self.notify_timeout.as_millis() as u64,
                    "Fallback notification timed out"
                ),
            }
        };
        let staged = stage_payload(
            self.staging.as_ref(),
            UNDELIVERED_BLOB_PREFIX,
            &order_id,
            &report.payload,
        );
        let ((), staged) = tokio::join!(notified, staged);

        match staged {
            Ok(blob) => {
                info!(
                    order_id = %order_id,
                    container = %blob.container,
                    blob = %blob.name,
                    "Undelivered order staged"
                );
                Ok(DispatchOutcome::StagedAfterFailure {
                    order_id,
                    attempts,
                    blob,
                    error: report.error,
                })
            }
            Err(source) => {
                error!(
                    order_id = %order_id,
                    backend = self.staging.backend(),
                    error = %source,
                    "Failed to stage undelivered order"
                );
                Err(DispatchError::Staging { order_id, source })
            }
        }
    }
}
