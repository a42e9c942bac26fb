//! Rate-limit response headers
//!
//! - `X-RateLimit-Limit`: requests allowed per window
//! - `X-RateLimit-Remaining`: requests left in the window
//! - `X-RateLimit-Reset`: Unix time (seconds, fractional) the window resets
//! - `X-RateLimit-Reset-After`: seconds until reset, preferred over `Reset`
//! - `X-RateLimit-Bucket`: server bucket hash
//! - `X-RateLimit-Global`: present on global 429s
//! - `X-RateLimit-Scope`: `user`, `global` or `shared`
//! - `Retry-After`: seconds to wait after a 429

use reqwest::header::HeaderMap;
use std::str::FromStr;
use std::time::Duration;

/// Parsed rate-limit headers of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset: Option<f64>,
    pub reset_after: Option<f64>,
    pub bucket: Option<String>,
    pub global: bool,
    pub scope: Option<String>,
    pub retry_after: Option<f64>,
}

impl RateLimitHeaders {
    pub fn parse(headers: &HeaderMap) -> Self {
        let global = header_str(headers, "x-ratelimit-global")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            || header_str(headers, "x-ratelimit-scope").is_some_and(|v| v == "global");

        Self {
            limit: parse_header(headers, "x-ratelimit-limit"),
            remaining: parse_header(headers, "x-ratelimit-remaining"),
            reset: parse_header(headers, "x-ratelimit-reset"),
            reset_after: parse_header(headers, "x-ratelimit-reset-after"),
            bucket: header_str(headers, "x-ratelimit-bucket").map(str::to_string),
            global,
            scope: header_str(headers, "x-ratelimit-scope").map(str::to_string),
            retry_after: parse_header(headers, "retry-after"),
        }
    }

    /// Time until the window resets, relative to `now_unix_ms`
    pub fn reset_in(&self, now_unix_ms: i64) -> Option<Duration> {
        if let Some(after) = self.reset_after {
            return seconds(after);
        }
        let reset_ms = self.reset? * 1000.0;
        seconds(((reset_ms - now_unix_ms as f64) / 1000.0).max(0.0))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after.and_then(seconds)
    }
}

/// `retry_after` from a 429 JSON body, used when the header is absent
pub fn body_retry_after(body: &[u8]) -> Option<f64> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .get("retry_after")?
        .as_f64()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn parse_header<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name)?.parse().ok()
}

/// Non-negative, finite seconds as a duration
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_parse_bucket_headers() {
        let parsed = RateLimitHeaders::parse(&headers(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1470173023.123"),
            ("x-ratelimit-reset-after", "2.0"),
            ("x-ratelimit-bucket", "abcd1234"),
        ]));

        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(0));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert!(!parsed.global);
        assert_eq!(parsed.reset_in(0), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_reset_falls_back_to_absolute_time() {
        let parsed = RateLimitHeaders::parse(&headers(&[("x-ratelimit-reset", "100.5")]));
        assert_eq!(parsed.reset_in(99_000), Some(Duration::from_millis(1500)));
        // already past
        assert_eq!(parsed.reset_in(200_000), Some(Duration::ZERO));
    }

    #[test]
    fn test_global_flags() {
        let parsed = RateLimitHeaders::parse(&headers(&[
            ("x-ratelimit-global", "true"),
            ("retry-after", "3"),
        ]));
        assert!(parsed.global);
        assert_eq!(parsed.retry_after(), Some(Duration::from_secs(3)));

        let scoped = RateLimitHeaders::parse(&headers(&[("x-ratelimit-scope", "global")]));
        assert!(scoped.global);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let parsed = RateLimitHeaders::parse(&headers(&[
            ("x-ratelimit-remaining", "-1"),
            ("retry-after", "soon"),
            ("x-ratelimit-reset-after", "NaN"),
        ]));
        assert_eq!(parsed.remaining, None);
        assert_eq!(parsed.retry_after(), None);
        assert_eq!(parsed.reset_in(0), None);
    }

    #[test]
    fn test_body_retry_after() {
        assert_eq!(
            body_retry_after(br#"{"message": "You are being rate limited.", "retry_after": 0.75, "global": false}"#),
            Some(0.75)
        );
        assert_eq!(body_retry_after(b"not json"), None);
    }
}
