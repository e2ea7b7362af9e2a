use std::time::Duration;

/// Attempts per item, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Pause between attempts; rides out short network drops.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up; the item is abandoned.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-attempt, fixed-cooldown policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the next attempt.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based and counts the attempt that just failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts.max(1) {
            RetryDecision::NoRetry
        } else {
            RetryDecision::RetryAfter(self.cooldown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_three_attempts_one_second() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.cooldown, Duration::from_secs(1));
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1), RetryDecision::RetryAfter(Duration::from_secs(1)));
        assert_eq!(p.decide(2), RetryDecision::RetryAfter(Duration::from_secs(1)));
        assert_eq!(p.decide(3), RetryDecision::NoRetry);
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        let p = RetryPolicy {
            max_attempts: 0,
            cooldown: Duration::ZERO,
        };
        assert_eq!(p.decide(1), RetryDecision::NoRetry);
    }
}
