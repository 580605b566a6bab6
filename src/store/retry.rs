//! Bounded retries for backing-store calls.
//!
//! Only `RemoteUnavailable` is retried; every other error (e.g.
//! `NotFound`) is returned at once.  The pause between attempts is
//! fixed, and the attempt count is capped at `MAX_ATTEMPTS_CAP`.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::errors::{ErrorKind, Result};

/// Hard ceiling on attempts per call, whatever the configuration says.
pub const MAX_ATTEMPTS_CAP: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to `1..=MAX_ATTEMPTS_CAP`.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS_CAP),
            delay,
        }
    }

    /// Try exactly once.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind() == ErrorKind::RemoteUnavailable && attempt < policy.max_attempts => {
                debug!(operation = what, attempt, error = %e, "backing store call failed, retrying");
                attempt += 1;
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TierVaultError;
    use std::cell::Cell;

    #[test]
    fn attempts_are_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(50, Duration::ZERO).max_attempts(), MAX_ATTEMPTS_CAP);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result: Result<()> = with_retries(&policy, "put", || {
            calls.set(calls.get() + 1);
            async { Err(TierVaultError::RemoteUnavailable("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retries(&RetryPolicy::default(), "get", || {
            calls.set(calls.get() + 1);
            async { Err(TierVaultError::NotFound("blob".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = with_retries(&policy, "put", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 2 {
                    Err(TierVaultError::RemoteUnavailable("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
