//! Retry utilities: linear backoff builder for `backon`.
//!
//! `backon` ships constant, exponential and fibonacci strategies. Order
//! dispatch waits `attempt * base_delay` between attempts, which none of
//! them produce.

use std::time::Duration;

use backon::BackoffBuilder;

/// Linear backoff: `base_delay * 1`, `base_delay * 2`, ...
///
/// Yields at most `max_times` delays, i.e. `max_times + 1` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBuilder {
    base_delay: Duration,
    max_times: usize,
}

impl Default for LinearBuilder {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_times: 2,
        }
    }
}

impl LinearBuilder {
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_times(mut self, max_times: usize) -> Self {
        self.max_times = max_times;
        self
    }
}

impl BackoffBuilder for LinearBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            base_delay: self.base_delay,
            max_times: self.max_times,
            taken: 0,
        }
    }
}

/// Backoff produced by [`LinearBuilder`].
#[derive(Debug)]
pub struct LinearBackoff {
    base_delay: Duration,
    max_times: usize,
    taken: usize,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.taken >= self.max_times {
            return None;
        }
        self.taken += 1;
        let factor = u32::try_from(self.taken).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_delays() {
        let delays: Vec<_> = LinearBuilder::default()
            .with_base_delay(Duration::from_millis(1000))
            .with_max_times(4)
            .build()
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(3000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[test]
    fn test_zero_max_times_never_waits() {
        let mut backoff = LinearBuilder::default().with_max_times(0).build();
        assert_eq!(backoff.next(), None);
    }

    #[test]
    fn test_delays_non_decreasing() {
        let delays: Vec<_> = LinearBuilder::default()
            .with_base_delay(Duration::from_millis(250))
            .with_max_times(10)
            .build()
            .collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }
}
