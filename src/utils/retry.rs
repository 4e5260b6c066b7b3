//! Fixed-delay retry executor for async operations.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5000))
    }
}

/// Every attempt failed; carries the last error seen.
#[derive(Debug)]
pub struct RetryError<E> {
    pub label: String,
    pub attempts: u32,
    pub last: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed after {} attempts. Last error: {}",
            self.label, self.attempts, self.last
        )
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// The closure receives the 1-based attempt number. Between failed attempts
/// the executor sleeps for `policy.delay`; there is no sleep after the last.
pub async fn retry<T, E, F, Fut>(
    label: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    label, attempt, max_attempts, e
                );
                if attempt >= max_attempts {
                    return Err(RetryError {
                        label: label.to_string(),
                        attempts: attempt,
                        last: e,
                    });
                }
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
