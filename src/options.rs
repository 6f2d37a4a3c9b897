use std::time::Duration;

/// Bounded exponential backoff applied to transient upstream failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. `0` behaves like `1`.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after every retry. Fractional values such
    /// as `1.5` are allowed; delays are rounded to whole milliseconds.
    pub backoff_multiplier: f64,
    /// Optional cap for a single delay, in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Effective attempt budget.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based) and before the next one.
    ///
    /// Equals `initial_delay_ms * backoff_multiplier^(attempt - 1)`, saturating on
    /// overflow and bounded by `max_delay_ms` when set. A negative or NaN
    /// product yields no delay.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay_ms =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powf(f64::from(exp));
        // `as` saturates: +inf maps to u64::MAX, NaN and negatives to 0.
        Duration::from_millis(self.cap(delay_ms.round() as u64))
    }

    /// Sum of every delay the policy can wait before it gives up.
    pub fn total_backoff(&self) -> Duration {
        (1..self.attempts())
            .map(|attempt| self.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    fn cap(&self, delay_ms: u64) -> u64 {
        match self.max_delay_ms {
            Some(max) => delay_ms.min(max),
            None => delay_ms,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: None,
        }
    }
}

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Optional bound on the whole call, every attempt and wait included.
    pub deadline_ms: Option<u64>,
    /// Retry behavior for transient failures.
    pub retry: RetryPolicy,
}

impl ClientOptions {
    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets an overall deadline for one call.
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            deadline_ms: None,
            retry: RetryPolicy::default(),
        }
    }
}
