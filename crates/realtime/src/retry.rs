//! Fixed-delay reconnection policy.
//!
//! Every failed or lost connection consumes one attempt from a bounded budget
//! and waits the same constant delay before the next try. The delay does not
//! grow: the total time spent retrying is bounded by `delay * max_attempts`.
//! A successful connection (or an explicit `connect`) restores the budget.
//!
//! # Examples
//!
//! ```ignore
//! use std::time::Duration;
//! use deface_realtime::retry::RetryPolicy;
//!
//! let mut policy = RetryPolicy::new(Duration::from_secs(3), 2);
//! assert_eq!(policy.next_delay().unwrap(), Duration::from_secs(3));
//! assert_eq!(policy.next_delay().unwrap(), Duration::from_secs(3));
//! assert!(policy.next_delay().is_err());
//!
//! policy.reset();
//! assert_eq!(policy.attempt(), 0);
//! ```

use std::time::Duration;

use thiserror::Error;

/// Raised when the retry budget is spent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    /// All attempts were used; the `u32` is the configured maximum.
    #[error("Maximum number of reconnection attempts reached: {0}")]
    Exhausted(u32),
}

/// Reconnection counter plus the constant delay between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Wait before each reconnection attempt.
    delay: Duration,

    /// Attempts allowed between two successful connections.
    max_attempts: u32,

    /// Consecutive attempts scheduled since the last success.
    attempt: u32,
}

impl RetryPolicy {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            attempt: 0,
        }
    }

    /// Schedules one more attempt.
    ///
    /// Returns the delay to wait and increments the counter, or
    /// `RetryError::Exhausted` once the counter reached the maximum. The
    /// counter never exceeds `max_attempts`.
    pub fn next_delay(&mut self) -> Result<Duration, RetryError> {
        if self.attempt >= self.max_attempts {
            return Err(RetryError::Exhausted(self.max_attempts));
        }
        self.attempt += 1;
        Ok(self.delay)
    }

    /// Zeroes the counter. Called on every successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    /// 3 second delay, 5 attempts.
    fn default() -> Self {
        Self::new(Duration::from_secs(3), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(), Duration::from_secs(3));
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.attempt(), 0);
    }

    #[test]
    fn test_delay_is_constant() {
        let mut policy = RetryPolicy::new(Duration::from_millis(250), 4);
        let delays: Vec<_> = (0..4).map(|_| policy.next_delay().unwrap()).collect();
        assert!(delays.iter().all(|d| *d == Duration::from_millis(250)));
        assert_eq!(policy.attempt(), 4);
    }

    #[test]
    fn test_exhaustion_stops_counting() {
        let mut policy = RetryPolicy::new(Duration::from_secs(1), 2);
        policy.next_delay().unwrap();
        policy.next_delay().unwrap();
        assert!(policy.is_exhausted());

        assert_eq!(policy.next_delay(), Err(RetryError::Exhausted(2)));
        assert_eq!(policy.next_delay(), Err(RetryError::Exhausted(2)));
        assert_eq!(policy.attempt(), 2);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut policy = RetryPolicy::new(Duration::from_secs(1), 1);
        policy.next_delay().unwrap();
        assert!(policy.next_delay().is_err());

        policy.reset();
        assert_eq!(policy.attempt(), 0);
        assert!(policy.next_delay().is_ok());
    }

    #[test]
    fn test_zero_attempts_never_retries() {
        let mut policy = RetryPolicy::new(Duration::from_secs(1), 0);
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_delay(), Err(RetryError::Exhausted(0)));
    }
}
