//! Rate-limit coordinator
//!
//! Maps route keys to buckets. Once a response names its server bucket, the
//! route is aliased to `hash:major` so every route sharing that server bucket
//! shares one accounting unit.

use corvid_core::events::RateLimit;
use dashmap::DashMap;
use parking_lot::RwLock;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::bucket::{Bucket, GlobalBucket, Slot};
use super::headers::RateLimitHeaders;
use crate::route::RouteKey;

/// Used when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Receives a [`RateLimit`] for every 429 and every pre-emptive wait
pub type RateLimitObserver = mpsc::UnboundedSender<RateLimit>;

#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Bucket id (route key or `hash:major`) to bucket
    buckets: DashMap<String, Arc<Bucket>>,
    /// Route key to server bucket hash
    hashes: DashMap<String, String>,
    global: GlobalBucket,
    observer: RwLock<Option<RateLimitObserver>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the channel that receives rate-limit notifications
    pub fn set_observer(&self, observer: RateLimitObserver) {
        *self.observer.write() = Some(observer);
    }

    /// Bucket currently responsible for `route`
    pub fn bucket(&self, route: &RouteKey) -> Arc<Bucket> {
        let id = self.bucket_id(route);
        let entry = self.buckets.entry(id).or_insert_with(|| Arc::new(Bucket::new()));
        Arc::clone(entry.value())
    }

    /// Server bucket hash learned for `route`
    pub fn bucket_hash(&self, route: &RouteKey) -> Option<String> {
        self.hashes.get(route.key()).map(|h| h.value().clone())
    }

    pub fn global(&self) -> &GlobalBucket {
        &self.global
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Wait for a slot on `route`'s bucket
    pub async fn acquire(&self, route: &RouteKey) -> Slot {
        let bucket = self.bucket(route);
        let wait = bucket.acquire(&self.global).await;

        if wait.waited() {
            let global = !wait.global.is_zero();
            let waited = wait.bucket + wait.global;
            tracing::debug!(
                route = %route,
                waited_ms = waited.as_millis() as u64,
                global,
                "Waited for rate limit"
            );
            self.notify(route, waited, global);
        }
        Slot::new(bucket)
    }

    /// Feed a response back into the coordinator
    ///
    /// Returns the delay to observe before retrying when `status` is 429.
    pub async fn release(
        &self,
        route: &RouteKey,
        slot: Slot,
        status: StatusCode,
        headers: &RateLimitHeaders,
    ) -> Option<Duration> {
        let bucket = slot.settle();
        if let Some(hash) = &headers.bucket {
            self.alias(route, hash, &bucket);
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        bucket.update(headers, now_ms).await;

        if status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }

        let retry_after = headers.retry_after().unwrap_or(DEFAULT_RETRY_AFTER);
        if headers.global {
            self.global.pause_for(retry_after);
        } else if headers.scope.as_deref() != Some("shared") {
            bucket.exhaust_for(retry_after).await;
        }

        tracing::warn!(
            route = %route,
            bucket = ?headers.bucket,
            retry_after_ms = retry_after.as_millis() as u64,
            global = headers.global,
            "Rate limited"
        );
        self.notify(route, retry_after, headers.global);
        Some(retry_after)
    }

    fn bucket_id(&self, route: &RouteKey) -> String {
        match self.hashes.get(route.key()) {
            Some(hash) => format!("{}:{}", hash.value(), route.major()),
            None => route.key().to_string(),
        }
    }

    fn alias(&self, route: &RouteKey, hash: &str, bucket: &Arc<Bucket>) {
        let known = self
            .hashes
            .get(route.key())
            .is_some_and(|current| current.value() == hash);
        if known {
            return;
        }

        self.hashes.insert(route.key().to_string(), hash.to_string());
        self.buckets
            .entry(format!("{hash}:{}", route.major()))
            .or_insert_with(|| Arc::clone(bucket));
        tracing::debug!(route = %route, bucket = hash, "Learned bucket hash");
    }

    fn notify(&self, route: &RouteKey, retry_after: Duration, global: bool) {
        let observer = self.observer.read();
        let Some(observer) = observer.as_ref() else {
            return;
        };

        let event = RateLimit {
            route: route.key().to_string(),
            bucket: self.bucket_hash(route),
            retry_after_ms: retry_after.as_millis() as u64,
            global,
        };
        if observer.send(event).is_err() {
            tracing::trace!("Rate limit observer dropped");
        }
    }
}
