//! Linear-backoff retry for provider calls
//!
//! Attempt n (1-based) that fails with a retryable error is followed by a
//! sleep of n * base_delay: 1s, 2s, ... with the defaults.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::RetryConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Single attempt, no sleeping
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                debug!("{} failed with non-retryable {}", label, e.code_str());
                return Err(e);
            }
            Err(e) => {
                if attempt < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    if e.code == ErrorCode::UpstreamRateLimited {
                        warn!(
                            "⏳ {} rate limited, backing off {}ms (attempt {}/{})",
                            label,
                            delay.as_millis(),
                            attempt,
                            policy.max_attempts
                        );
                    } else {
                        debug!(
                            "⏳ {} retry {}/{} after {}ms: {}",
                            label,
                            attempt + 1,
                            policy.max_attempts,
                            delay.as_millis(),
                            e
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        AppError::internal(format!("{} gave up after {} attempts", label, policy.max_attempts))
    }))
}
