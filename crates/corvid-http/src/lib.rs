//! # corvid-http
//!
//! REST requester with per-route token buckets, a global bucket and
//! header-driven bucket discovery.

pub mod client;
pub mod error;
pub mod ratelimit;
pub mod route;

pub use client::{CreateMessage, GatewayBot, HttpClient, Request, RequestBody, Response, SessionStartLimit};
pub use error::HttpError;
pub use ratelimit::{RateLimitHeaders, RateLimitObserver, RateLimiter};
pub use route::RouteKey;

// Re-export for callers building requests
pub use reqwest::{Method, StatusCode};
