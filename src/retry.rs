//! Retry utilities with exponential backoff and jitter.
//!
//! Two flavours are provided:
//!
//! - [`retry_with_backoff`] retries an async operation in place. The operator
//!   uses it only for startup work (the initial dependency index scan).
//! - [`BackoffTracker`] computes per-object requeue delays for the controller
//!   `error_policy`, so repeated failures of the same object back off
//!   exponentially while other objects are unaffected.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tracing::{error, warn};

/// Backoff configuration shared by [`retry_with_backoff`] and [`BackoffTracker`]
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0, // infinite
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Un-jittered delay before the given attempt (1-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Apply 0.5x to 1.5x jitter to a delay
fn jittered(delay: Duration) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * jitter)
}

/// Execute an async operation with exponential backoff and jitter.
///
/// Retries indefinitely (or up to max_attempts if set) until success.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let delay = jittered(config.delay_for_attempt(attempt));
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Per-key failure counter driving controller requeue delays
///
/// Keys are object keys (`namespace/name`). A key's counter grows on every
/// failed pass and is cleared by [`BackoffTracker::reset`] after a successful one.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    config: RetryConfig,
    failures: Mutex<HashMap<String, u32>>,
}

impl BackoffTracker {
    /// Create a tracker using the given backoff configuration
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return the jittered delay before the next pass
    pub fn next_delay(&self, key: &str) -> Duration {
        let attempt = {
            let mut failures = self.failures.lock();
            let count = failures.entry(key.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        jittered(self.config.delay_for_attempt(attempt)).min(self.config.max_delay)
    }

    /// Number of consecutive failures recorded for `key`
    pub fn failures(&self, key: &str) -> u32 {
        self.failures.lock().get(key).copied().unwrap_or(0)
    }

    /// Forget the failure history of `key`
    pub fn reset(&self, key: &str) {
        self.failures.lock().remove(key);
    }
}
