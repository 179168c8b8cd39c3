//! Retry Policy
//!
//! One parameterized backoff object shared by every adapter call site,
//! instead of per-call sleep loops.

use std::future::Future;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Bounded retry with a fixed backoff schedule.
///
/// The schedule length is the attempt count: `[0s, 2s, 5s]` means three
/// attempts, the first immediate. Only transient errors (rate limits, server
/// errors, connection failures) are retried; anything else is returned to
/// the caller on the spot.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::ZERO,
            Duration::from_secs(2),
            Duration::from_secs(5),
        ])
    }
}

impl RetryPolicy {
    pub fn new(backoff: Vec<Duration>) -> Self {
        let backoff = if backoff.is_empty() {
            vec![Duration::ZERO]
        } else {
            backoff
        };
        Self { backoff }
    }

    /// Zero-delay schedule with `attempts` tries. Handy in tests.
    pub fn immediate(attempts: usize) -> Self {
        Self::new(vec![Duration::ZERO; attempts.max(1)])
    }

    pub fn max_attempts(&self) -> usize {
        self.backoff.len()
    }

    /// Run `op`, retrying transient failures per the schedule. Backoff
    /// sleeps block only this call, never other in-flight fetches.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let wait = self.backoff[attempt];
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.backoff.len() || !err.is_transient() {
                        return Err(err);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.backoff.len(),
                        error = %err,
                        "transient source failure, retrying"
                    );
                }
            }
        }
    }
}
