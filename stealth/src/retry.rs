//! Bounded exponential backoff for idempotent network calls

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given (0-indexed) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay_ms.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// the attempts run out. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        debug!(operation = operation_name, attempt = attempt + 1, attempts, "executing");

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempt = attempt + 1, "succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                let last = attempt + 1 >= attempts;
                if last || !should_retry(&e) {
                    if last && attempts > 1 {
                        warn!(operation = operation_name, attempts, error = %e, "giving up");
                    }
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    attempts,
                    error = %e,
                    "failed, retrying in {:?}",
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
