//! Route keys
//!
//! A route key names the rate-limit accounting unit of a request before the
//! server has told us its bucket hash. IDs in major positions (the channel,
//! guild or webhook a path is rooted at) stay literal; every other ID becomes
//! a placeholder.

use corvid_core::Snowflake;
use reqwest::Method;
use std::fmt;

/// Resources whose ID is a major parameter
const MAJOR_RESOURCES: [&str; 3] = ["channels", "guilds", "webhooks"];

/// Messages younger than this are deleted through a separate bucket
const NEW_MESSAGE_MS: u64 = 10_000;

/// Messages older than this are deleted through a separate bucket
const OLD_MESSAGE_MS: u64 = 14 * 24 * 60 * 60 * 1000;

/// Path-derived rate-limit key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    key: String,
    major: String,
}

impl RouteKey {
    /// Derive the key for `method path` at the current time
    pub fn new(method: &Method, path: &str) -> Self {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self::at(method, path, now_ms)
    }

    /// Derive the key as of `now_ms` (Unix milliseconds)
    ///
    /// Time only matters for message deletions, which are sub-keyed by the
    /// age of the message.
    pub fn at(method: &Method, path: &str, now_ms: u64) -> Self {
        let path = path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut normalized: Vec<&str> = Vec::with_capacity(segments.len());
        let mut major = Vec::new();

        for (i, &segment) in segments.iter().enumerate() {
            let previous = if i > 0 { segments[i - 1] } else { "" };
            let root = segments.first().copied().unwrap_or_default();

            let kept = if i == 1 && MAJOR_RESOURCES.contains(&root) {
                major.push(segment);
                segment
            } else if i == 2 && root == "webhooks" {
                // webhook token
                major.push(segment);
                segment
            } else if previous == "reactions" {
                ":reaction"
            } else if i == 2 && root == "interactions" {
                ":token"
            } else if is_id(segment) {
                ":id"
            } else {
                segment
            };
            normalized.push(kept);
        }

        let mut key = format!("{} /{}", method.as_str(), normalized.join("/"));
        if *method == Method::DELETE {
            if let Some(sub) = message_delete_sub_key(&segments, now_ms) {
                key.push('#');
                key.push_str(sub);
            }
        }

        Self {
            key,
            major: major.join("/"),
        }
    }

    /// Full key, e.g. `DELETE /channels/10/messages/:id`
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Major parameters joined with `/`; empty for unscoped routes
    #[inline]
    pub fn major(&self) -> &str {
        &self.major
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// `new` or `old` for `DELETE /channels/{id}/messages/{id}`
fn message_delete_sub_key(segments: &[&str], now_ms: u64) -> Option<&'static str> {
    let [root, _, messages, message_id] = segments else {
        return None;
    };
    if *root != "channels" || *messages != "messages" {
        return None;
    }

    let age = Snowflake::parse(message_id).ok()?.age_ms(now_ms);
    if age < NEW_MESSAGE_MS {
        Some("new")
    } else if age > OLD_MESSAGE_MS {
        Some("old")
    } else {
        None
    }
}
