//! Bounded retry and timeout policy for ledger interactions.
//!
//! An operation is attempted at most `max_attempts` times. Each attempt is cut
//! off after `per_attempt_timeout`; the whole sequence, backoff sleeps
//! included, is cut off after `total_timeout` even in the middle of an attempt.
//! Fatal failures end the sequence at once.

use crate::correlation::StepContext;
use crate::error::{FailureClass, HarnessError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// Attempt and time bounds for one operation. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    per_attempt_timeout: Duration,
    total_timeout: Duration,
    backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy without backoff between attempts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `max_attempts` is zero or a timeout is zero.
    pub fn new(
        max_attempts: u32,
        per_attempt_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(HarnessError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if per_attempt_timeout.is_zero() || total_timeout.is_zero() {
            return Err(HarnessError::ConfigError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            per_attempt_timeout,
            total_timeout,
            backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        })
    }

    /// Sleeps `initial` after the first retryable failure, doubling up to `max`.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Same bounds, with `retries` retries after the first attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.max_attempts = retries.saturating_add(1);
        self
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Bound on a single attempt.
    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    /// Bound on the whole sequence.
    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout: Duration::from_secs(60),
            total_timeout: Duration::from_secs(5 * 60),
            backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

/// Failure of a single attempt, as classified by the operation itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    /// Whether another attempt may help.
    pub class: FailureClass,
    /// Human-readable cause.
    pub message: String,
}

impl AttemptError {
    /// A network or timeout class failure.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Retryable,
            message: message.into(),
        }
    }

    /// A rejection by the remote system.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Fatal,
            message: message.into(),
        }
    }
}

/// Successful result together with the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed<T> {
    /// Value returned by the successful attempt.
    pub value: T,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
}

/// Runs `operation` under `policy`.
///
/// The closure receives the 1-based attempt number. It must send the same
/// payload on every call; this layer never rebuilds inputs.
///
/// # Errors
///
/// Returns `OperationFailed` when a fatal failure occurs, attempts run out, or
/// the total timeout expires.
pub async fn execute<T, F, Fut>(
    ctx: &StepContext,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<Executed<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let mut attempts = 0u32;
    let mut last_error: Option<String> = None;

    let run = run_attempts(ctx, policy, &mut operation, &mut attempts, &mut last_error);
    let outcome = time::timeout(policy.total_timeout, run).await;

    match outcome {
        Ok(result) => result,
        Err(_) => {
            let reason = format!(
                "total timeout of {}ms exceeded",
                policy.total_timeout.as_millis()
            );
            warn!(
                step = %ctx.step(),
                correlation_id = %ctx.correlation_id(),
                attempts,
                "{}",
                reason
            );
            Err(HarnessError::OperationFailed {
                class: FailureClass::Retryable,
                attempts,
                last_error: match last_error {
                    Some(last) => format!("{} (last error: {})", reason, last),
                    None => reason,
                },
            })
        }
    }
}

async fn run_attempts<T, F, Fut>(
    ctx: &StepContext,
    policy: &RetryPolicy,
    operation: &mut F,
    attempts: &mut u32,
    last_error: &mut Option<String>,
) -> Result<Executed<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let mut backoff = policy.backoff;

    loop {
        *attempts += 1;
        let attempt = *attempts;
        ctx.record_attempt();
        debug!(
            step = %ctx.step(),
            correlation_id = %ctx.correlation_id(),
            attempt,
            max_attempts = policy.max_attempts,
            "Starting attempt"
        );

        let failure = match time::timeout(policy.per_attempt_timeout, operation(attempt)).await {
            Ok(Ok(value)) => {
                return Ok(Executed {
                    value,
                    attempts: attempt,
                })
            }
            Ok(Err(e)) => e,
            Err(_) => AttemptError::retryable(format!(
                "attempt timed out after {}ms",
                policy.per_attempt_timeout.as_millis()
            )),
        };
        *last_error = Some(failure.message.clone());

        if failure.class == FailureClass::Fatal || attempt >= policy.max_attempts {
            warn!(
                step = %ctx.step(),
                correlation_id = %ctx.correlation_id(),
                attempt,
                class = %failure.class,
                error = %failure.message,
                "Operation failed"
            );
            return Err(HarnessError::OperationFailed {
                class: failure.class,
                attempts: attempt,
                last_error: failure.message,
            });
        }

        warn!(
            step = %ctx.step(),
            correlation_id = %ctx.correlation_id(),
            attempt,
            error = %failure.message,
            "Attempt failed, retrying"
        );

        if !backoff.is_zero() {
            time::sleep(backoff).await;
            backoff = (backoff * 2).min(policy.max_backoff);
        }
    }
}
