//! Liveness ping timer for an open connection.
//!
//! A [`KeepAlive`] is created when a connection is established and lives
//! inside the kernel's connected phase, so leaving that phase drops it and no
//! ping can outlive its connection.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug)]
pub struct KeepAlive {
    interval: Interval,
    period: Duration,
}

impl KeepAlive {
    /// First tick fires one full `period` after creation.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        // A stalled kernel sends one late ping, not a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// Waits for the next ping slot. Cancel safe.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::new(Duration::from_secs(30));

        let first = keep_alive.tick().await;
        assert_eq!(first - start, Duration::from_secs(30));

        let second = keep_alive.tick().await;
        assert_eq!(second - start, Duration::from_secs(60));
        assert_eq!(keep_alive.period(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ticks_are_not_bursted() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::new(Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(35)).await;
        let late = keep_alive.tick().await;
        assert!(late - start >= Duration::from_secs(10));

        // Next slot is one period after the late tick, not at 20s.
        let next = keep_alive.tick().await;
        assert!(next - start >= Duration::from_secs(45));
    }
}
