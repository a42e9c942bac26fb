//! Heartbeat bookkeeping for one connection
//!
//! At most one heartbeat is outstanding. A tick that finds the previous one
//! still unacknowledged marks the connection as a zombie.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Write a heartbeat now
    Send,
    /// The last heartbeat was never acknowledged
    Zombie,
}

#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    ack_pending: bool,
    sent_at: Option<Instant>,
    latency: Option<Duration>,
}

impl Heartbeat {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ack_pending: false,
            sent_at: None,
            latency: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// First tick, uniform in `[0, interval]` so shards do not beat in step
    pub fn first_delay(&self) -> Duration {
        self.interval.mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
    }

    pub fn on_tick(&mut self, now: Instant) -> Tick {
        if self.ack_pending {
            return Tick::Zombie;
        }
        self.ack_pending = true;
        self.sent_at = Some(now);
        Tick::Send
    }

    /// Clear the pending flag, returning the round trip if a beat was in flight
    pub fn on_ack(&mut self, now: Instant) -> Option<Duration> {
        self.ack_pending = false;
        let latency = now.saturating_duration_since(self.sent_at.take()?);
        self.latency = Some(latency);
        Some(latency)
    }

    pub fn is_ack_pending(&self) -> bool {
        self.ack_pending
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
