//! Bounded retry with deterministic exponential backoff.
//!
//! The schedule is `min(base * 2^(n-1), cap)` with no jitter, so concurrent
//! sessions recovering from a shared outage retry in lockstep. Adding jitter
//! here would be a reasonable hardening if that ever becomes a problem in
//! practice.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::api::error::TransportError;
use crate::config::constants::retry;

/// One try of an operation, 1-based. Threaded through the executor as a
/// value so retry state never lives on a shared object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    index: u32,
}

impl Attempt {
    pub fn first() -> Self {
        Self { index: 1 }
    }

    pub fn next(self) -> Self {
        Self {
            index: self.index + 1,
        }
    }

    pub fn index(self) -> u32 {
        self.index
    }
}

/// Retry tuning for one class of operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retryable_statuses: &'static [u16],
    /// Message substrings classified as transient in addition to the status
    /// rule. Empty for atomic requests; the streaming policy matches broadly
    /// because the backend surfaces upstream outages as free-text errors.
    pub transient_signatures: &'static [&'static str],
}

impl RetryConfig {
    /// Policy for atomic JSON request/response calls.
    pub fn atomic() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry::ATOMIC_BASE_DELAY_MS),
            max_delay: Duration::from_millis(retry::MAX_DELAY_MS),
            retryable_statuses: retry::RETRYABLE_STATUSES,
            transient_signatures: &[],
        }
    }

    /// Policy for streaming answers.
    pub fn streaming() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry::STREAM_BASE_DELAY_MS),
            max_delay: Duration::from_millis(retry::MAX_DELAY_MS),
            retryable_statuses: retry::RETRYABLE_STATUSES,
            transient_signatures: retry::TRANSIENT_SIGNATURES,
        }
    }

    /// Backoff before re-running after the given attempt failed.
    pub fn delay_for(&self, attempt: Attempt) -> Duration {
        let exponent = attempt.index().saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::atomic()
    }
}

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

/// Pure classifier: (attempt, failure) to (retry?, delay).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether the failure is expected to self-resolve.
    pub fn is_transient(&self, error: &TransportError) -> bool {
        match error {
            TransportError::Network(_) | TransportError::StreamRead(_) => true,
            TransportError::Status { code, .. }
                if self.config.retryable_statuses.contains(code) =>
            {
                true
            }
            other => {
                let message = other.to_string().to_lowercase();
                self.config
                    .transient_signatures
                    .iter()
                    .any(|signature| message.contains(signature))
            }
        }
    }

    pub fn decide(&self, attempt: Attempt, error: &TransportError) -> RetryDecision {
        if attempt.index() < self.config.max_attempts && self.is_transient(error) {
            RetryDecision {
                retry: true,
                delay: self.config.delay_for(attempt),
            }
        } else {
            RetryDecision {
                retry: false,
                delay: Duration::ZERO,
            }
        }
    }
}

/// Runs one idempotent async operation under a retry policy.
///
/// Only safe for read-style operations: a retried write accepts the risk of
/// duplicate execution server-side.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive `op` to a single terminal result. Transient failures are
    /// retried with backoff up to the configured ceiling and then surfaced
    /// as `RetriesExhausted`; everything else propagates on first
    /// occurrence.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = Attempt::first();
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let decision = self.policy.decide(attempt, &error);
                    if !decision.retry {
                        if self.policy.is_transient(&error) {
                            return Err(TransportError::RetriesExhausted {
                                attempts: attempt.index(),
                                last: Box::new(error),
                            });
                        }
                        return Err(error);
                    }
                    warn!(
                        attempt = attempt.index(),
                        delay_ms = decision.delay.as_millis() as u64,
                        error = %error,
                        "transient request failure, backing off before retry"
                    );
                    sleep(decision.delay).await;
                    attempt = attempt.next();
                }
            }
        }
    }
}
