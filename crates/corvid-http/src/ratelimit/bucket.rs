//! Route buckets and the global bucket

use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Instant};

use super::headers::RateLimitHeaders;

/// Accounting state of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub limit: u32,
    pub remaining: u32,
    /// `None` until the server reports a window
    pub reset_at: Option<Instant>,
}

/// Time spent waiting inside [`Bucket::acquire`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquireWait {
    pub bucket: Duration,
    pub global: Duration,
}

impl AcquireWait {
    #[inline]
    pub fn waited(&self) -> bool {
        !self.bucket.is_zero() || !self.global.is_zero()
    }
}

/// Token bucket for one route or server bucket hash
///
/// Holding the mutex while sleeping serialises requests only when the
/// bucket is exhausted. An exhausted bucket with no known window waits on
/// `settled` until an in-flight request reports headers or gives its slot
/// back.
#[derive(Debug)]
pub struct Bucket {
    state: Mutex<BucketState>,
    settled: Notify,
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Bucket {
    /// Unknown bucket: one request may probe for headers
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BucketState {
                limit: 1,
                remaining: 1,
                reset_at: None,
            }),
            settled: Notify::new(),
        }
    }

    /// Wait for a slot and take it
    pub async fn acquire(&self, global: &GlobalBucket) -> AcquireWait {
        let mut wait = AcquireWait::default();
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();
            match state.reset_at {
                Some(reset_at) if now >= reset_at => {
                    state.remaining = state.limit;
                    state.reset_at = None;
                }
                Some(reset_at) if state.remaining == 0 => {
                    sleep_until(reset_at).await;
                    wait.bucket += reset_at.saturating_duration_since(now);
                    continue;
                }
                None if state.remaining == 0 => {
                    // registered before the lock is released, so no wakeup is lost
                    let settled = self.settled.notified();
                    drop(state);
                    settled.await;
                    wait.bucket += now.elapsed();
                    state = self.state.lock().await;
                    continue;
                }
                _ => {}
            }
            break;
        }

        wait.global = global.wait().await;
        state.remaining = state.remaining.saturating_sub(1);
        wait
    }

    /// Apply the headers of a completed response
    ///
    /// A response without accounting headers hands its slot back while no
    /// window is known.
    pub async fn update(&self, headers: &RateLimitHeaders, now_unix_ms: i64) {
        let mut state = self.state.lock().await;
        if let Some(limit) = headers.limit {
            state.limit = limit;
        }
        if let Some(remaining) = headers.remaining {
            state.remaining = remaining;
        }
        if let Some(reset_in) = headers.reset_in(now_unix_ms) {
            state.reset_at = Some(Instant::now() + reset_in);
        }
        if headers.remaining.is_none() && state.reset_at.is_none() {
            state.remaining = (state.remaining + 1).min(state.limit);
        }
        drop(state);
        self.settled.notify_waiters();
    }

    /// Give back a slot whose request produced no response
    pub async fn restore(&self) {
        let mut state = self.state.lock().await;
        if state.reset_at.is_none() {
            state.remaining = (state.remaining + 1).min(state.limit);
        }
        drop(state);
        self.settled.notify_waiters();
    }

    /// Block the bucket for `duration` after a route-scoped 429
    pub async fn exhaust_for(&self, duration: Duration) {
        let mut state = self.state.lock().await;
        state.remaining = 0;
        state.reset_at = Some(Instant::now() + duration);
        drop(state);
        self.settled.notify_waiters();
    }

    pub async fn snapshot(&self) -> BucketState {
        *self.state.lock().await
    }
}

/// A slot taken from a [`Bucket`]
///
/// Settled by the rate limiter once the response is applied. A slot dropped
/// unsettled, e.g. by a cancelled request, is restored in the background.
#[derive(Debug)]
pub struct Slot {
    bucket: Arc<Bucket>,
    settled: bool,
}

impl Slot {
    pub(crate) fn new(bucket: Arc<Bucket>) -> Self {
        Self {
            bucket,
            settled: false,
        }
    }

    pub fn bucket(&self) -> &Arc<Bucket> {
        &self.bucket
    }

    /// Mark the slot as accounted for by a response
    pub(crate) fn settle(mut self) -> Arc<Bucket> {
        self.settled = true;
        Arc::clone(&self.bucket)
    }

    /// Hand the slot back after a request that never got a response
    pub async fn restore(mut self) {
        self.settled = true;
        self.bucket.restore().await;
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let bucket = Arc::clone(&self.bucket);
        handle.spawn(async move { bucket.restore().await });
    }
}

/// Singleton bucket that pauses every request
#[derive(Debug, Default)]
pub struct GlobalBucket {
    pause_until: SyncMutex<Option<Instant>>,
}

impl GlobalBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause all requests for `duration`; an existing longer pause wins
    pub fn pause_for(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut pause = self.pause_until.lock();
        if pause.map_or(true, |current| current < until) {
            *pause = Some(until);
        }
    }

    /// End of the current pause, if one is active
    pub fn paused_until(&self) -> Option<Instant> {
        let now = Instant::now();
        let pause = *self.pause_until.lock();
        pause.filter(|until| *until > now)
    }

    /// Sleep through any active pause, returning how long that took
    pub async fn wait(&self) -> Duration {
        let started = Instant::now();
        let mut slept = false;
        while let Some(until) = self.paused_until() {
            sleep_until(until).await;
            slept = true;
        }
        if slept {
            started.elapsed()
        } else {
            Duration::ZERO
        }
    }
}
