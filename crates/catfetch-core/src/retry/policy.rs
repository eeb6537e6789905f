use std::time::Duration;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server asked us to slow down (429).
    Throttled,
    /// Request timed out.
    Timeout,
    /// Any other error (not retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error; it is terminal on its own.
    NoRetry,
    /// The error was retryable but the attempt budget is spent.
    Exhausted,
    /// Retry after the given delay (zero = immediately).
    RetryAfter(Duration),
}

/// Bounded retry policy. Throttling and timeouts share one attempt counter;
/// each has its own base delay. With `backoff_multiplier` 1.0 the delay is fixed.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay after a throttled response.
    pub throttle_delay: Duration,
    /// Delay after a timeout.
    pub timeout_delay: Duration,
    /// Growth factor per retry.
    pub backoff_multiplier: f64,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            throttle_delay: Duration::from_secs(10),
            timeout_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after `attempt` failed with `kind`.
    ///
    /// `attempt` is 1-based (1 = first attempt).
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        let base = match kind {
            ErrorKind::Other => return RetryDecision::NoRetry,
            ErrorKind::Throttled => self.throttle_delay,
            ErrorKind::Timeout => self.timeout_delay,
        };
        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.scaled(base, attempt))
    }

    fn scaled(&self, base: Duration, attempt: u32) -> Duration {
        if base.is_zero() {
            return base;
        }
        let exp = attempt.saturating_sub(1).min(16) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exp);
        let secs = (base.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }
}
