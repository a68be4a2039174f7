//! Uniform retry-with-backoff for external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::MatcherError;

/// Exponential backoff policy applied by [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Runs `call` under `policy`, bounding every attempt by `timeout`.
///
/// Only errors for which [`MatcherError::is_transient`] holds are retried; the
/// last error is returned once attempts are exhausted.
pub(crate) async fn with_retry<T, F, Fut>(
    api: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    mut call: F,
) -> Result<T, MatcherError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MatcherError>>,
{
    let total_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(MatcherError::Timeout {
                api: api.to_string(),
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < total_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    api,
                    attempt = attempt + 1,
                    total_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
