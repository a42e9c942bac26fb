//! Error taxonomy
//!
//! Concrete error enums differ per crate; [`ErrorKind`] is the shared
//! classification consumers branch on.

use corvid_core::ModelError;
use std::fmt;

use crate::config::ConfigError;

/// Broad error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Token rejected, disallowed intents, invalid shard. Never retried.
    FatalAuthentication,
    /// Socket, TLS or server-side failure. Retried with backoff.
    TransientNetwork,
    /// 429 that survived the internal retry
    RateLimit,
    /// Malformed payload or unexpected opcode
    Protocol,
    /// Invalid argument or missing option supplied by the caller
    Consumer,
    /// Lookup found nothing
    CacheMiss,
    /// Deadline expired or the session was closed
    Cancelled,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed if retried
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TransientNetwork | Self::RateLimit)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FatalAuthentication => "fatal_authentication",
            Self::TransientNetwork => "transient_network",
            Self::RateLimit => "rate_limit",
            Self::Protocol => "protocol",
            Self::Consumer => "consumer",
            Self::CacheMiss => "cache_miss",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that map onto an [`ErrorKind`]
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for ModelError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } | Self::WrongShard { .. } => ErrorKind::Protocol,
            Self::NotDispatchable(_) => ErrorKind::Consumer,
            _ => ErrorKind::CacheMiss,
        }
    }
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Consumer
    }
}
