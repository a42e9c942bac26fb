//! Reconnect backoff: 1 s doubling to 60 s, with ±20% jitter

use rand::Rng;
use std::time::Duration;

const BASE: Duration = Duration::from_secs(1);
const MAX: Duration = Duration::from_secs(60);
const JITTER: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new() -> Self {
        Self::with_bounds(BASE, MAX)
    }

    #[must_use]
    pub fn with_bounds(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempts: 0,
        }
    }

    /// Delay before the next attempt; each call doubles the next one
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
        ceiling.mul_f64(factor)
    }

    /// Un-jittered delay for attempt `n`, counting from zero
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(multiplier).min(self.max)
    }

    /// Called once a connection reaches READY or RESUMED
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_is_bounded() {
        let mut backoff = Backoff::new();
        for n in 0..12u32 {
            let delay = backoff.next_delay();
            let ceiling = Duration::from_secs(2u64.pow(n).min(60));
            assert!(delay >= ceiling.mul_f64(0.8), "attempt {n}: {delay:?}");
            assert!(delay <= ceiling.mul_f64(1.2), "attempt {n}: {delay:?}");
        }
        assert_eq!(backoff.attempts(), 12);
    }

    #[test]
    fn test_ceiling_caps_at_sixty_seconds() {
        let backoff = Backoff::new();
        assert_eq!(backoff.ceiling(0), Duration::from_secs(1));
        assert_eq!(backoff.ceiling(3), Duration::from_secs(8));
        assert_eq!(backoff.ceiling(6), Duration::from_secs(60));
        assert_eq!(backoff.ceiling(40), Duration::from_secs(60));
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay() <= Duration::from_millis(1200));
    }
}
