use std::collections::BTreeSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Statuses retried by default: request timeout, throttling, transient 5xx.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// High-level classification of a failed attempt for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Attempt timed out (connect/transfer).
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Server asked us to slow down (429, 503).
    Throttled(u16),
    /// Retryable 5xx that is not throttling.
    ServerError(u16),
    /// Any other status listed as retryable (408, per-operation extras).
    RetryableStatus(u16),
    /// 404 from the secondary endpoint: replication lag, retry on primary.
    SecondaryNotFound,
    /// Never retried.
    NonRetryable,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::NonRetryable)
    }
}

/// Error as seen by the retry policy: its kind plus an optional server
/// back-off hint (`Retry-After`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub retry_after: Option<Duration>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, hint: Option<Duration>) -> Self {
        self.retry_after = hint;
        self
    }
}

impl From<ErrorKind> for ClassifiedError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Why the policy stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The error is not retryable; it propagates unchanged.
    NotRetryable,
    /// `attempt >= max_attempts`.
    AttemptsExhausted,
    /// Waiting again would overrun the overall elapsed budget.
    ElapsedBudgetExceeded,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop(StopReason),
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps and seeded jitter.
///
/// Immutable once built; share it freely across concurrent operations.
/// `decide` depends only on its arguments and this configuration: the
/// jitter for attempt `n` is drawn from an RNG seeded with
/// `(jitter_seed, n)`, so repeated calls agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    jitter_seed: u64,
    retryable_statuses: BTreeSet<u16>,
    max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            jitter: true,
            jitter_seed: rand::random(),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries (one attempt).
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Maximum number of attempts, including the first. Clamped to >= 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Fix the jitter seed (for reproducible delays).
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = seed;
        self
    }

    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Give up once waiting again would push total elapsed time past `budget`.
    pub fn with_max_elapsed(mut self, budget: Option<Duration>) -> Self {
        self.max_elapsed = budget;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed
    }

    pub fn retryable_statuses(&self) -> &BTreeSet<u16> {
        &self.retryable_statuses
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Decide what to do after attempt `attempt` (1-based) failed with
    /// `error`, `elapsed` after the first attempt started.
    pub fn decide(&self, attempt: u32, error: &ClassifiedError, elapsed: Duration) -> RetryDecision {
        if !error.kind.is_transient() {
            return RetryDecision::Stop(StopReason::NotRetryable);
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Stop(StopReason::AttemptsExhausted);
        }
        let delay = self.backoff(attempt, error.retry_after);
        if let Some(budget) = self.max_elapsed {
            if elapsed.saturating_add(delay) > budget {
                return RetryDecision::Stop(StopReason::ElapsedBudgetExceeded);
            }
        }
        RetryDecision::RetryAfter(delay)
    }

    /// `min(max_delay, base * 2^(attempt-1))`, raised to a server hint if
    /// one was given (still capped), plus jitter in `[0, base)`.
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        let mut delay = self.base_delay.saturating_mul(exp).min(self.max_delay);
        if let Some(hint) = hint {
            delay = delay.max(hint.min(self.max_delay));
        }
        delay.saturating_add(self.jitter_for(attempt))
    }

    fn jitter_for(&self, attempt: u32) -> Duration {
        let span = u64::try_from(self.base_delay.as_nanos()).unwrap_or(u64::MAX);
        if !self.jitter || span == 0 {
            return Duration::ZERO;
        }
        let seed = self.jitter_seed ^ u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = StdRng::seed_from_u64(seed);
        Duration::from_nanos(rng.gen_range(0..span))
    }
}
