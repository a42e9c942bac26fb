//! Gateway and session errors

use corvid_common::{Classify, ConfigError, ErrorKind};
use corvid_core::{ModelError, RespondError};
use corvid_http::HttpError;
use corvid_interactions::IngressError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::protocol::{CloseCode, InflateError};

/// Errors raised by a shard connection
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Closed with a code that reconnecting cannot fix
    #[error("Gateway closed the session: {reason} ({code})")]
    FatalClose { code: u16, reason: String },

    #[error("WebSocket error: {0}")]
    Transport(Box<tungstenite::Error>),

    /// Unexpected opcode, missing HELLO, or a command sent on the wrong path
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed gateway payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport decompression failed: {0}")]
    Inflate(#[from] InflateError),

    /// The shard or session is no longer running
    #[error("Gateway connection closed")]
    Closed,

    #[error("Gateway discovery failed: {0}")]
    Http(#[from] HttpError),

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Session is already connected")]
    AlreadyConnected,
}

impl From<tungstenite::Error> for GatewayError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl GatewayError {
    /// Build the error for a fatal close code
    pub fn fatal_close(code: CloseCode) -> Self {
        Self::FatalClose {
            code: code.as_u16(),
            reason: code.description().to_string(),
        }
    }

    /// Stops the shard instead of reconnecting
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::FatalClose { .. } | Self::InvalidUrl(_) => true,
            Self::Http(e) => e.kind() == ErrorKind::FatalAuthentication,
            _ => false,
        }
    }
}

impl Classify for GatewayError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::FatalClose { .. } => ErrorKind::FatalAuthentication,
            Self::Transport(_) | Self::Inflate(_) => ErrorKind::TransientNetwork,
            Self::Protocol(_) | Self::Decode(_) => ErrorKind::Protocol,
            Self::Closed => ErrorKind::Cancelled,
            Self::Http(e) => e.kind(),
            Self::InvalidUrl(_) | Self::AlreadyConnected => ErrorKind::Consumer,
        }
    }
}

/// Top-level error for [`Session`](crate::Session) operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Respond(#[from] RespondError),

    #[error(transparent)]
    Ingress(#[from] IngressError),
}

impl Classify for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Gateway(e) => e.kind(),
            Self::Http(e) => e.kind(),
            Self::Config(e) => e.kind(),
            Self::Model(e) => e.kind(),
            Self::Respond(RespondError::Expired) => ErrorKind::Cancelled,
            Self::Respond(RespondError::Delivery(_)) => ErrorKind::TransientNetwork,
            Self::Respond(_) => ErrorKind::Consumer,
            Self::Ingress(e) => e.kind(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_close() {
        let err = GatewayError::fatal_close(CloseCode::AuthenticationFailed);
        assert!(err.is_fatal());
        assert_eq!(err.kind(), ErrorKind::FatalAuthentication);
        assert_eq!(
            err.to_string(),
            "Gateway closed the session: Authentication failed (4004)"
        );
    }

    #[test]
    fn test_http_unauthorized_is_fatal() {
        assert!(GatewayError::Http(HttpError::Unauthorized).is_fatal());
        assert!(!GatewayError::Http(HttpError::Server { status: 502 }).is_fatal());
        assert!(!GatewayError::Closed.is_fatal());
    }

    #[test]
    fn test_facade_kinds() {
        let err: Error = RespondError::AlreadyResponded.into();
        assert_eq!(err.kind(), ErrorKind::Consumer);

        let err: Error = GatewayError::Protocol("no HELLO".into()).into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.to_string(), "Protocol error: no HELLO");
    }
}
