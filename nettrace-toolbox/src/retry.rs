//! Generic retry executor with pluggable backoff.
//!
//! The executor knows nothing about networking: it runs a zero-argument async operation until it
//! succeeds, the retry predicate rejects the failure, or the attempt budget runs out. Every wait
//! between attempts races the caller's [`CancellationToken`].

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::collab::{Logger, NoopLogger};
use crate::error::{NetTraceError, NetTraceResult, codes};

/// Upper bound for exponential backoff.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(30);

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Maps a 1-based attempt number to the wait before the next attempt.
pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Backoff policy, selectable per call.
#[derive(Clone)]
pub enum BackoffPolicy {
    /// `min(base * 2^(attempt - 1), 30s)`
    Exponential,
    /// `base * attempt`
    Linear,
    /// Caller-supplied delay function.
    Custom(BackoffFn),
}

impl BackoffPolicy {
    /// Build a [`Custom`](Self::Custom) policy from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        match self {
            Self::Exponential => {
                let factor = 1_u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                base.checked_mul(factor)
                    .unwrap_or(MAX_BACKOFF_DELAY)
                    .min(MAX_BACKOFF_DELAY)
            }
            Self::Linear => base.saturating_mul(attempt),
            Self::Custom(f) => f(attempt),
        }
    }

    fn exhausted_code(&self) -> &'static str {
        match self {
            Self::Exponential => codes::RETRY_EXHAUSTED,
            Self::Linear => codes::LINEAR_RETRY_EXHAUSTED,
            Self::Custom(_) => codes::CUSTOM_RETRY_EXHAUSTED,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Linear => "linear",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs fallible operations with bounded retries.
#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    base_delay: Duration,
    logger: Arc<dyn Logger>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            logger: Arc::new(NoopLogger),
        }
    }
}

impl RetryExecutor {
    /// Create an executor. Zero values fall back to the defaults (3 attempts, 1s).
    pub fn new(max_attempts: u32, base_delay: Duration, logger: Arc<dyn Logger>) -> Self {
        let mut executor = Self {
            logger,
            ..Self::default()
        };
        executor.set_max_attempts(max_attempts);
        executor.set_base_delay(base_delay);
        executor
    }

    /// Set the attempt budget. Zero is ignored.
    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        if max_attempts > 0 {
            self.max_attempts = max_attempts;
        }
    }

    /// Set the backoff base delay. Zero is ignored.
    pub fn set_base_delay(&mut self, base_delay: Duration) {
        if !base_delay.is_zero() {
            self.base_delay = base_delay;
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Run `operation` until it succeeds or retrying stops.
    ///
    /// # Errors
    /// - `RETRY_CANCELLED` when `cancel` fires before or during an attempt
    /// - `RETRY_DELAY_CANCELLED` when `cancel` fires while waiting between attempts
    /// - the policy's exhaustion code (`RETRY_EXHAUSTED`, `LINEAR_RETRY_EXHAUSTED`,
    ///   `CUSTOM_RETRY_EXHAUSTED`) wrapping the last failure, when the budget is spent or
    ///   `is_retryable` rejects a failure
    pub async fn execute<T, E, F, Fut, P>(
        &self,
        cancel: &CancellationToken,
        policy: &BackoffPolicy,
        mut operation: F,
        is_retryable: P,
    ) -> NetTraceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Send + Sync + 'static,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts;
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(codes::RETRY_CANCELLED, attempt, "before attempt"));
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(cancelled(codes::RETRY_CANCELLED, attempt, "during attempt"));
                }
                outcome = operation() => outcome,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retryable = is_retryable(&err);
            if attempt >= max_attempts || !retryable {
                self.logger.warn(&format!(
                    "[Retry] Giving up after attempt {attempt}/{max_attempts} (retryable={retryable}): {err}"
                ));
                return Err(NetTraceError::network(
                    policy.exhausted_code(),
                    format!("operation failed after {attempt} attempt(s): {err}"),
                )
                .with_cause(err)
                .with_context("attempts", attempt)
                .with_context("policy", policy.name()));
            }

            let delay = policy.delay(self.base_delay, attempt);
            self.logger.warn(&format!(
                "[Retry] Attempt {attempt}/{max_attempts} failed, retrying in {:.1}s: {err}",
                delay.as_secs_f32()
            ));

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(cancelled(codes::RETRY_DELAY_CANCELLED, attempt, "during backoff delay")
                        .with_cause(err));
                }
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

fn cancelled(code: &'static str, attempt: u32, phase: &str) -> NetTraceError {
    NetTraceError::network(code, format!("operation cancelled {phase}"))
        .with_context("attempt", attempt)
}
