//! Retry policy wrapping a transport.
//!
//! Attempts run strictly one after another. After the n-th failure the
//! policy waits `n * base_delay` (linear, not exponential) before the next
//! attempt, and gives up after `max_attempts`. Non-retryable failures end
//! the loop immediately.

use std::time::Duration;

use backon::Retryable;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use super::attempt::DispatchAttempt;
use crate::order::OrderPayload;
use crate::transport::{Transport, TransportError, TransportType};
use crate::utils::retry::LinearBuilder;

/// Default attempts for a retrying transport.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay unit between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default ceiling on a single attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first. Defaults per transport type.
    pub max_attempts: Option<u32>,
    /// Delay unit in milliseconds; the n-th retry waits `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

/// Outcome of running a transport under a retry policy.
#[derive(Debug)]
pub enum RetryOutcome {
    Delivered {
        attempts: Vec<DispatchAttempt>,
    },
    Exhausted {
        attempts: Vec<DispatchAttempt>,
        last_error: TransportError,
    },
}

impl RetryOutcome {
    pub fn attempts(&self) -> &[DispatchAttempt] {
        match self {
            RetryOutcome::Delivered { attempts } | RetryOutcome::Exhausted { attempts, .. } => {
                attempts
            }
        }
    }
}

/// Bounded linear retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// One attempt, no retry.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Build the policy for a transport from configuration.
    pub fn from_config(config: &RetryConfig, transport: TransportType, attempt_timeout: Duration) -> Self {
        Self::new(
            config
                .max_attempts
                .unwrap_or_else(|| transport.default_max_attempts()),
            Duration::from_millis(config.base_delay_ms),
        )
        .with_attempt_timeout(attempt_timeout)
    }

    /// Bound every single attempt, independently of the retry budget.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    fn backoff(&self) -> LinearBuilder {
        LinearBuilder::default()
            .with_base_delay(self.base_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Run `transport` until it succeeds, fails permanently, or the attempt
    /// budget runs out.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        order_id: &str,
        payload: &OrderPayload,
    ) -> RetryOutcome {
        let started = Instant::now();
        let attempt_timeout = self.attempt_timeout;
        let log = Mutex::new(Vec::with_capacity(self.max_attempts as usize));

        let result = {
            let log = &log;
            (move || async move {
                let number = log.lock().await.len() as u32 + 1;
                let started_at = Utc::now();
                let offset = started.elapsed();

                let result =
                    match tokio::time::timeout(attempt_timeout, transport.attempt(order_id, payload))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout(attempt_timeout)),
                    };

                log.lock().await.push(DispatchAttempt::record(
                    order_id,
                    number,
                    transport.name(),
                    started_at,
                    offset,
                    &result,
                ));
                result
            })
            .retry(self.backoff())
            .when(TransportError::is_retryable)
            .notify(|err: &TransportError, delay: Duration| {
                warn!(
                    order_id = %order_id,
                    strategy = transport.name(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Delivery attempt failed, retrying"
                );
            })
            .await
        };

        let attempts = log.into_inner();
        match result {
            Ok(()) => RetryOutcome::Delivered { attempts },
            Err(last_error) => RetryOutcome::Exhausted {
                attempts,
                last_error,
            },
        }
    }
}
