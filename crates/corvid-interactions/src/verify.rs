//! Ed25519 request signatures
//!
//! The platform signs `timestamp || raw_body` with the application key. The
//! check is a pure function of its inputs and the configured key.

use corvid_common::ClientConfig;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, SIGNATURE_LENGTH};

use crate::error::IngressError;

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Build from a 64-character hex public key
    pub fn from_hex(public_key: &str) -> Result<Self, IngressError> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| IngressError::InvalidPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IngressError::InvalidPublicKey("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| IngressError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, IngressError> {
        let key = config
            .public_key
            .as_deref()
            .ok_or(IngressError::MissingPublicKey)?;
        Self::from_hex(key)
    }

    #[must_use]
    pub fn from_key(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Whether `signature_hex` signs `timestamp || body`
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        if bytes.len() != SIGNATURE_LENGTH {
            return false;
        }
        let Ok(signature) = Signature::from_slice(&bytes) else {
            return false;
        };

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}
