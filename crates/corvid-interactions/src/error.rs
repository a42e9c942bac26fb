//! Ingress errors and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use corvid_common::{Classify, ErrorKind};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid request signature")]
    InvalidSignature,

    /// Raised while building the verifier, never per request
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("No public key configured")]
    MissingPublicKey,

    #[error("Malformed interaction body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("No response within the deadline")]
    Timeout,
}

impl IngressError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::InvalidPublicKey(_) | Self::MissingPublicKey | Self::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingHeader(_) => "MISSING_SIGNATURE",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidPublicKey(_) => "INVALID_PUBLIC_KEY",
            Self::MissingPublicKey => "MISSING_PUBLIC_KEY",
            Self::MalformedBody(_) => "MALFORMED_BODY",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::Timeout => "RESPONSE_TIMEOUT",
        }
    }
}

impl Classify for IngressError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingHeader(_) | Self::InvalidSignature | Self::MalformedBody(_) => {
                ErrorKind::Protocol
            }
            Self::InvalidPublicKey(_) | Self::MissingPublicKey | Self::Encode(_) => {
                ErrorKind::Consumer
            }
            Self::Timeout => ErrorKind::Cancelled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "Interaction ingress failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Rejected interaction request");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
