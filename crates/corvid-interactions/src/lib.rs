//! # corvid-interactions
//!
//! HTTP ingress for interactions delivered by signed callback instead of the
//! gateway. Requests are checked against the application's Ed25519 public key,
//! PINGs are answered inline, and everything else is handed to an
//! [`InteractionSink`] with a responder that completes the pending request.

pub mod error;
pub mod multipart;
pub mod responder;
pub mod router;
pub mod verify;

pub use error::IngressError;
pub use multipart::MultipartBody;
pub use responder::CallbackResponder;
pub use router::{router, IngressConfig, IngressState, InteractionSink};
pub use verify::SignatureVerifier;

/// Hex-encoded Ed25519 signature header
pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";

/// Timestamp header; signed together with the raw body
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";
