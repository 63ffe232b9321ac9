//! Retry Policy - Re-fetch Until the Result Is Acceptable
//!
//! Some upstream APIs answer HTTP 200 with a syntactically valid but
//! semantically empty payload under load. Such a response can only be
//! told apart from a genuine "no data" state by inspecting the parsed
//! result, so the policy is driven by a caller-supplied predicate
//! rather than by transport errors.
//!
//! Backoff: after unacceptable attempt `n` (1-indexed) the policy sleeps
//! `base_delay × 2^n`, i.e. 2s, 4s, 8s with the default 1s base.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// Predicate-driven retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is raised to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Maximum number of calls to the fetch function.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep inserted after unacceptable attempt `attempt` (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Call `fetch` until `is_acceptable` approves a result or the
    /// attempts run out.
    ///
    /// Never fails on its own: after the last attempt the last result
    /// is returned as-is and the caller decides what an unacceptable
    /// final result means.
    pub async fn execute<T, F, Fut, P>(&self, mut fetch: F, is_acceptable: P) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let mut attempt = 1;
        loop {
            let result = fetch().await;

            if is_acceptable(&result) {
                if attempt > 1 {
                    debug!(attempt, "Result accepted after retry");
                }
                return result;
            }

            if attempt >= self.max_attempts {
                warn!(
                    attempts = attempt,
                    "Retry budget exhausted, returning last result"
                );
                return result;
            }

            let delay = self.delay_after(attempt);
            debug!(
                attempt,
                delay_ms = delay.as_millis(),
                "Result not acceptable, backing off"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
