//! Retry policy - bounded attempts with exponential backoff and jitter

use std::time::Duration;

use rand::Rng;

/// Bounded retry with exponential backoff
///
/// Attempt numbering is 1-based: `max_attempts = 3` means up to three calls
/// total. `delay_for(n)` is the pause *before* attempt `n + 1`: base delay
/// doubled per completed attempt, capped at `max_delay`, plus up to 25%
/// random jitter so workers retrying against the same throttled sink do not
/// stampede in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed (including the first)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Ceiling for the exponential backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit settings
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Whether another attempt is allowed after `attempts` completed calls
    #[inline]
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Backoff before the attempt following `completed_attempts` (1-based)
    ///
    /// Exponential, capped, with additive jitter in `[0, delay/4]`.
    pub fn delay_for(&self, completed_attempts: u32) -> Duration {
        let shift = completed_attempts.saturating_sub(1).min(16);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay.as_millis() as u64);

        let jitter_ms = if delay_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=delay_ms / 4)
        };

        Duration::from_millis(delay_ms.saturating_add(jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_exactly_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1));
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(800));

        // Jitter adds at most 25%, so compare against the deterministic part.
        let d1 = policy.delay_for(1);
        let d3 = policy.delay_for(3);
        assert!(d1 >= Duration::from_millis(100));
        assert!(d1 <= Duration::from_millis(125));
        assert!(d3 >= Duration::from_millis(400));
        assert!(d3 <= Duration::from_millis(500));

        // Capped at max_delay (+ jitter) from attempt 4 on.
        let d6 = policy.delay_for(6);
        assert!(d6 >= Duration::from_millis(800));
        assert!(d6 <= Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_base_delay_stays_zero() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(5), Duration::ZERO);
    }

    #[test]
    fn test_large_attempt_counts_do_not_overflow() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1), Duration::from_secs(30));
        let d = policy.delay_for(60);
        assert!(d >= Duration::from_secs(30));
        assert!(d <= Duration::from_secs(38));
    }
}
