//! Retry policy shared by every outbound call site.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::TransportConfig;

use super::TransportError;

/// Decides which failures are worth another attempt.
pub type RetryPredicate = fn(&TransportError) -> bool;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before each retry.
    pub delay: Duration,
    pub retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retryable: TransportError::is_transient,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    /// Whether a failure on `attempt` (1-based) should be followed by another.
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retryable)(error)
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// `label` names the call in log lines.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(request = label, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if self.should_retry(&e, attempt) => {
                    warn!(
                        request = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
