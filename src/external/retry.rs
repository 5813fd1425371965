use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::external::error::ExternalError;

const DEFAULT_BASE_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Timeout and bounded exponential backoff applied to every external call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Delay before attempt `attempt + 1`, doubling from `base_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30))
    }
}

/// Run `call` until it succeeds, fails permanently, or runs out of attempts.
/// Each attempt is bounded by the policy timeout.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ExternalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExternalError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("{} attempt {}/{}", operation, attempt, policy.max_attempts);

        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ExternalError::Timeout(policy.timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                warn!("{} failed permanently: {}", operation, e);
                return Err(e);
            }
            Err(e) if attempt >= policy.max_attempts => {
                warn!("{} failed after {} attempts: {}", operation, attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    operation, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
