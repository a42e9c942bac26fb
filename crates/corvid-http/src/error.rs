//! REST errors

use corvid_common::{Classify, ErrorKind};
use std::time::Duration;

/// Errors surfaced by [`HttpClient`](crate::HttpClient)
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// 401; the configured token has been cleared
    #[error("Unauthorized: token rejected")]
    Unauthorized,

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Still 429 after the internal retry
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration, global: bool },

    /// 5xx after the retry budget was spent
    #[error("Server error: {status}")]
    Server { status: u16 },

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call's deadline expired
    #[error("Request cancelled")]
    Cancelled,

    /// The owning session has been closed
    #[error("Client closed")]
    Closed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    /// HTTP status behind this error, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Server { status } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Classify for HttpError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::FatalAuthentication,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Server { .. } | Self::Transport(_) => ErrorKind::TransientNetwork,
            Self::Decode(_) => ErrorKind::Protocol,
            Self::NotFound { .. } => ErrorKind::CacheMiss,
            Self::Cancelled | Self::Closed => ErrorKind::Cancelled,
            Self::Forbidden { .. } | Self::Status { .. } | Self::InvalidRequest(_) => {
                ErrorKind::Consumer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(HttpError::Unauthorized.status(), Some(401));
        assert_eq!(HttpError::Server { status: 502 }.status(), Some(502));
        assert_eq!(HttpError::Cancelled.status(), None);
    }

    #[test]
    fn test_classification() {
        assert_eq!(HttpError::Unauthorized.kind(), ErrorKind::FatalAuthentication);
        assert_eq!(
            HttpError::RateLimited {
                retry_after: Duration::from_secs(1),
                global: false
            }
            .kind(),
            ErrorKind::RateLimit
        );
        assert_eq!(HttpError::Server { status: 500 }.kind(), ErrorKind::TransientNetwork);
        assert_eq!(HttpError::Closed.kind(), ErrorKind::Cancelled);
        assert_eq!(
            HttpError::Forbidden {
                message: "Missing Access".into()
            }
            .kind(),
            ErrorKind::Consumer
        );
    }
}
