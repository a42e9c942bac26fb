//! REST rate limiting

mod bucket;
mod headers;
mod limiter;

pub use bucket::{AcquireWait, Bucket, BucketState, GlobalBucket, Slot};
pub use headers::{body_retry_after, RateLimitHeaders};
pub use limiter::{RateLimitObserver, RateLimiter};
