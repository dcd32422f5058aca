use std::time::Duration;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempts exhausted.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Constant-delay retry policy.
///
/// `max_retries` counts retries, not attempts: `max_retries = 3` allows four
/// attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay between attempts; does not grow.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decide what to do after `attempt` (0-based) failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_retries_three_allows_four_attempts() {
        let p = RetryPolicy::new(3, Duration::from_millis(10));
        assert_eq!(p.max_attempts(), 4);
        for attempt in 0..3 {
            assert_eq!(
                p.decide(attempt),
                RetryDecision::RetryAfter(Duration::from_millis(10))
            );
        }
        assert_eq!(p.decide(3), RetryDecision::NoRetry);
    }

    #[test]
    fn zero_retries_never_retries() {
        let p = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(p.max_attempts(), 1);
        assert_eq!(p.decide(0), RetryDecision::NoRetry);
    }

    #[test]
    fn delay_is_constant() {
        let p = RetryPolicy::new(10, Duration::from_millis(250));
        assert_eq!(p.decide(0), p.decide(8));
    }
}
