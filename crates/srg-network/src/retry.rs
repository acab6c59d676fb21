//! Retries with exponential backoff.
//!
//! Whether an attempt is retried is decided by a caller-provided closure, so
//! responses (a `503`, say) can be retried as well as errors. The closure may
//! also pass on a delay requested by the server through `Retry-After`, in
//! which case it replaces the computed backoff, within
//! [`RetryConfig::max_delay`].

use crate::config::NetworkConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy of a session.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included. Never less than 1.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any delay, server-requested ones included.
    pub max_delay: Duration,
    /// Growth factor of the backoff between consecutive retries.
    pub exponential_base: f64,
    /// Spread delays randomly between half and one and a half times the backoff.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_RETRY_ATTEMPTS,
            base_delay: NetworkConfig::RETRY_BASE_DELAY,
            max_delay: NetworkConfig::RETRY_MAX_DELAY,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retry.
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Set the total number of attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Set the backoff before the first retry.
    pub fn with_base_delay(self, base_delay: Duration) -> Self {
        Self { base_delay, ..self }
    }

    /// Set the upper bound of any delay.
    pub fn with_max_delay(self, max_delay: Duration) -> Self {
        Self { max_delay, ..self }
    }

    /// Enable or disable jitter.
    pub fn with_jitter(self, jitter: bool) -> Self {
        Self { jitter, ..self }
    }

    /// Backoff before retry number `retry` (0 for the first retry).
    pub fn backoff(&self, retry: u32) -> Duration {
        let cap = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let mut secs = (self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent)).min(cap);
        if self.jitter {
            secs = (secs * rand::rng().random_range(0.5..1.5)).min(cap);
        }
        Duration::from_secs_f64(secs)
    }

    /// Delay before retry number `retry`, honouring a server request if any.
    pub fn next_delay(&self, retry: u32, requested: Option<Duration>) -> Duration {
        requested
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or_else(|| self.backoff(retry))
    }
}

/// Decision taken on the outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Accept,
    /// Try again, after the given delay if the server requested one.
    Retry(Option<Duration>),
}

/// What it took to settle an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub attempts: u32,
    /// Time spent waiting between attempts.
    pub waited: Duration,
}

/// Run `operation` until `decide` accepts its outcome or attempts run out.
///
/// The last outcome is returned in both cases.
pub async fn retry_with_backoff<F, Fut, T, E, D>(
    config: &RetryConfig,
    mut operation: F,
    decide: D,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    D: Fn(&Result<T, E>) -> RetryDecision,
{
    let max_attempts = config.max_attempts.max(1);
    let mut stats = RetryStats::default();

    loop {
        stats.attempts += 1;
        let outcome = operation().await;

        let requested = match decide(&outcome) {
            RetryDecision::Accept => return (outcome, stats),
            RetryDecision::Retry(requested) => requested,
        };

        let reason = match &outcome {
            Ok(_) => "retryable response".to_string(),
            Err(e) => e.to_string(),
        };

        if stats.attempts >= max_attempts {
            warn!("Giving up after {} attempts: {}", stats.attempts, reason);
            return (outcome, stats);
        }

        let delay = config.next_delay(stats.attempts - 1, requested);
        debug!(
            "Attempt {}/{} unsuccessful ({}), next one in {:?}",
            stats.attempts, max_attempts, reason, delay
        );
        stats.waited += delay;
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retry_on_error(outcome: &Result<u16, String>) -> RetryDecision {
        if outcome.is_ok() {
            RetryDecision::Accept
        } else {
            RetryDecision::Retry(None)
        }
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(3))
            .with_jitter(false);

        let delays: Vec<_> = (0..5).map(|retry| config.backoff(retry)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(3),
            ]
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig::new().with_base_delay(Duration::from_secs(4));
        for _ in 0..50 {
            let delay = config.backoff(0);
            assert!(delay >= Duration::from_secs(2) && delay < Duration::from_secs(6));
        }
    }

    #[test]
    fn test_requested_delay_wins_but_is_capped() {
        let config = RetryConfig::new().with_max_delay(Duration::from_secs(10));
        assert_eq!(
            config.next_delay(4, Some(Duration::ZERO)),
            Duration::ZERO
        );
        assert_eq!(
            config.next_delay(0, Some(Duration::from_secs(3600))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_accepted_outcome_is_not_retried() {
        let (outcome, stats) =
            retry_with_backoff(&fast(5), || async { Ok::<u16, String>(200) }, retry_on_error).await;

        assert_eq!(outcome, Ok(200));
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let (outcome, stats) = retry_with_backoff(
            &fast(4),
            || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err("connection reset".to_string()),
                    _ => Ok(200),
                }
            },
            retry_on_error,
        )
        .await;

        assert_eq!(outcome, Ok(200));
        assert_eq!(stats.attempts, 3);
        assert!(stats.waited >= Duration::from_micros(2900));
        assert!(stats.waited <= Duration::from_micros(3100));
    }

    #[tokio::test]
    async fn test_last_outcome_returned_when_exhausted() {
        let (outcome, stats) = retry_with_backoff(
            &fast(2),
            || async { Ok::<u16, String>(503) },
            |outcome: &Result<u16, String>| match outcome {
                Ok(503) => RetryDecision::Retry(Some(Duration::from_millis(2))),
                _ => RetryDecision::Accept,
            },
        )
        .await;

        assert_eq!(outcome, Ok(503));
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.waited, Duration::from_millis(2));
    }
}
