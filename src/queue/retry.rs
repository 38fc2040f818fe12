// ==========================================
// VitalVida Sync Pipeline - retry policy
// ==========================================
// Declared per listener: a fixed attempt count plus a
// backoff array in seconds. Attempt n (1-based) that fails
// waits backoff[n-1]; past the end the last value repeats.
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_seconds: Vec<u64>,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(max_attempts: u32, backoff_seconds: Vec<u64>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_seconds,
        }
    }

    /// Single attempt, no retry
    pub fn once() -> Self {
        Self::new(1, Vec::new())
    }

    /// Delay before retrying after the `attempt`-th failure
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if self.backoff_seconds.is_empty() {
            return 0;
        }
        let idx = (attempt.max(1) as usize - 1).min(self.backoff_seconds.len() - 1);
        self.backoff_seconds[idx]
    }

    pub fn has_attempts_left(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_uses_backoff_then_repeats_last() {
        let policy = RetryPolicy::new(5, vec![5, 15, 30]);
        assert_eq!(policy.delay_for_attempt(1), 5);
        assert_eq!(policy.delay_for_attempt(3), 30);
        assert_eq!(policy.delay_for_attempt(4), 30);
        assert_eq!(policy.delay_for_attempt(40), 30);
        assert_eq!(policy.delay_for_attempt(0), 5);
    }

    #[test]
    fn test_empty_backoff_is_immediate() {
        let policy = RetryPolicy::new(3, Vec::new());
        assert_eq!(policy.delay_for_attempt(2), 0);
    }

    #[test]
    fn test_attempts_left() {
        let policy = RetryPolicy::new(3, vec![10]);
        assert!(policy.has_attempts_left(2));
        assert!(!policy.has_attempts_left(3));
        assert_eq!(RetryPolicy::new(0, vec![]).max_attempts, 1);
    }
}
