//! Per-attempt bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::transport::TransportError;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error: String, retryable: bool },
}

/// Record of one delivery attempt.
///
/// Lives only for the duration of a dispatch call; used for logging and
/// for reporting how many attempts were made.
#[derive(Debug, Clone)]
pub struct DispatchAttempt {
    pub order_id: String,
    /// 1-based attempt number.
    pub number: u32,
    pub strategy: &'static str,
    pub started_at: DateTime<Utc>,
    /// Offset from the start of the retry loop (monotonic clock).
    pub offset: Duration,
    pub outcome: AttemptOutcome,
}

impl DispatchAttempt {
    pub(crate) fn record(
        order_id: &str,
        number: u32,
        strategy: &'static str,
        started_at: DateTime<Utc>,
        offset: Duration,
        result: &Result<(), TransportError>,
    ) -> Self {
        let outcome = match result {
            Ok(()) => AttemptOutcome::Succeeded,
            Err(e) => AttemptOutcome::Failed {
                error: e.to_string(),
                retryable: e.is_retryable(),
            },
        };

        debug!(
            order_id = %order_id,
            attempt = number,
            strategy = strategy,
            offset_ms = offset.as_millis() as u64,
            outcome = ?outcome,
            "Delivery attempt finished"
        );

        Self {
            order_id: order_id.to_string(),
            number,
            strategy,
            started_at,
            offset,
            outcome,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_success() {
        let attempt =
            DispatchAttempt::record("o-1", 1, "direct", Utc::now(), Duration::ZERO, &Ok(()));
        assert!(attempt.succeeded());
        assert_eq!(attempt.number, 1);
    }

    #[test]
    fn test_record_failure_keeps_classification() {
        let attempt = DispatchAttempt::record(
            "o-1",
            2,
            "direct",
            Utc::now(),
            Duration::from_secs(1),
            &Err(TransportError::Config("missing".to_string())),
        );
        assert!(!attempt.succeeded());
        assert!(matches!(
            attempt.outcome,
            AttemptOutcome::Failed {
                retryable: false,
                ..
            }
        ));
    }
}
