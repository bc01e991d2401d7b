use std::time::Duration;

/// Bounds for one fetch: how often, how long, and what counts as plausible.
///
/// # Examples
///
/// ```
/// use nwpfetch_fetch::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default()
///     .max_attempts(3)
///     .attempt_timeout(Duration::from_secs(60))
///     .min_size(4096);
/// assert_eq!(policy.max_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    ///
    /// A value of zero is treated as one.
    ///
    /// Default: 5
    pub max_attempts: u32,

    /// Wall-clock bound for a single attempt.
    ///
    /// An attempt still running at this point is recorded as a timeout and
    /// abandoned; its output is never committed.
    ///
    /// Default: 300s
    pub attempt_timeout: Duration,

    /// Unit of the exponential backoff. The delay after attempt `k` is
    /// `min(backoff_unit * 2^k, backoff_cap)`.
    ///
    /// Default: 1s
    pub backoff_unit: Duration,

    /// Ceiling for a single backoff delay.
    ///
    /// Default: 30s
    pub backoff_cap: Duration,

    /// Smallest staged file accepted as a plausible result, in bytes.
    ///
    /// Default: 1024
    pub min_size: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts:    5,
            attempt_timeout: Duration::from_secs(300),
            backoff_unit:    Duration::from_secs(1),
            backoff_cap:     Duration::from_secs(30),
            min_size:        1024,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[must_use]
    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.backoff_cap = cap;
        self
    }

    #[must_use]
    pub fn min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// `max_attempts` with the zero case folded into a single attempt.
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after the given failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        crate::core::backoff_delay(attempt, self.backoff_unit, self.backoff_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(300));
        assert_eq!(policy.min_size, 1024);
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(5), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::default().max_attempts(0).effective_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(4).effective_attempts(), 4);
    }
}
