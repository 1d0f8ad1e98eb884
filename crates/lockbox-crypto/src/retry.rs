//! Bounded retry with recovery.
//!
//! Keeps device-specific flakiness handling out of the encrypt/decrypt
//! logic: callers wrap a risky operation, supply a recovery hook, and get
//! back either a success or the last failure.

use std::future::Future;
use std::time::Duration;

use crate::error::{CryptoError, Result};

/// A bounded, timed retry policy.
///
/// Runs an operation up to `max_attempts` times. After a transient failure
/// the recovery callback runs, then the policy sleeps for `delay` before the
/// next attempt. Non-transient errors abort immediately; when attempts are
/// exhausted the last failure is surfaced.
#[derive(Debug, Clone)]
pub struct TimedRetry {
    max_attempts: u32,
    delay: Duration,
}

impl TimedRetry {
    /// Create a retry policy.
    ///
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Maximum number of attempts (including the first).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_with_recovery(op, |_| async {}).await
    }

    /// Run `op`, invoking `recover` between attempts.
    ///
    /// The recovery callback receives the failure that triggered it; its own
    /// outcome is best-effort (a failed recovery just leads to the next
    /// attempt failing too).
    pub async fn run_with_recovery<T, F, Fut, R, RFut>(
        &self,
        mut op: F,
        mut recover: R,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(CryptoError) -> RFut,
        RFut: Future<Output = ()>,
    {
        let mut last = None;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "transient backend failure: {}",
                        e
                    );
                    if attempt < self.max_attempts {
                        recover(e.clone()).await;
                        tokio::time::sleep(self.delay).await;
                    }
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // max_attempts >= 1, so at least one failure was recorded.
        Err(last.unwrap_or_else(|| CryptoError::Transient("retry exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> TimedRetry {
        TimedRetry::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CryptoError>(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient() {
        let calls = AtomicU32::new(0);
        let recoveries = AtomicU32::new(0);

        let result = policy()
            .run_with_recovery(
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CryptoError::Transient("session dropped".into()))
                    } else {
                        Ok(7)
                    }
                },
                |_| async {
                    recoveries.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(recoveries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_surfaces_last_failure() {
        let result: Result<()> = policy()
            .run(|| async { Err(CryptoError::Transient("still down".into())) })
            .await;

        assert!(matches!(result, Err(CryptoError::Transient(_))));
    }

    #[tokio::test]
    async fn test_retry_aborts_on_fatal_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CryptoError::Configuration("no such provider".into()))
            })
            .await;

        assert!(matches!(result, Err(CryptoError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
