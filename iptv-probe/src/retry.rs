//! Bounded retries with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ProbeError, Result};
use crate::result::ValidationResult;
use crate::validator::Validator;

/// How many times to probe an endpoint and how long to wait in between.
///
/// # Retry Algorithm
///
/// - Attempt 1: immediate
/// - Attempt 2: after `base_delay * 2^0`
/// - Attempt 3: after `base_delay * 2^1`
///
/// Every failure kind is retried the same way; a bad status is treated as
/// transient just like a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total probes per endpoint, the first one included
    /// Default: 3
    pub max_attempts: u32,

    /// Delay before the second attempt, doubled for each one after
    /// Default: 1 second
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ProbeError::InvalidConfiguration(
                "Max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Wait before the attempt following `attempt_index` (zero-based).
    pub fn backoff(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }

    /// Probe until the first success or until the attempt budget is spent.
    ///
    /// Returns the last failure when every attempt fails. At least one probe
    /// is always issued, even when `max_attempts` is 0.
    pub async fn validate_with_retry<V>(
        &self,
        validator: &V,
        server_url: &str,
        device_id: &str,
        timeout: Duration,
    ) -> ValidationResult
    where
        V: Validator + ?Sized,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt_index = 0;

        loop {
            let result = validator.validate(server_url, device_id, timeout).await;
            match result {
                ValidationResult::Reachable => {
                    debug!(server_url, device_id, attempt = attempt_index + 1, "Endpoint reachable");
                    return result;
                }
                ValidationResult::Unreachable(kind) => {
                    debug!(
                        server_url,
                        device_id,
                        attempt = attempt_index + 1,
                        max_attempts = attempts,
                        %kind,
                        "Probe attempt failed"
                    );

                    if attempt_index + 1 >= attempts {
                        warn!(server_url, device_id, %kind, "Endpoint unreachable after {} attempts", attempts);
                        return result;
                    }

                    tokio::time::sleep(self.backoff(attempt_index)).await;
                    attempt_index += 1;
                }
            }
        }
    }
}

/// A [`Validator`] bound to a [`RetryPolicy`] and a per-attempt timeout.
#[derive(Clone)]
pub struct Prober {
    validator: Arc<dyn Validator>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober")
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Prober {
    pub fn new(validator: Arc<dyn Validator>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            validator,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `(server_url, device_id)` under the bound retry policy.
    pub async fn validate_with_retry(&self, server_url: &str, device_id: &str) -> ValidationResult {
        self.policy
            .validate_with_retry(self.validator.as_ref(), server_url, device_id, self.timeout)
            .await
    }
}
