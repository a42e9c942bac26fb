//! Interaction response hook

use async_trait::async_trait;

use crate::entities::{Interaction, InteractionResponse};

/// Delivers the initial response for an interaction
///
/// The HTTP ingress answers the pending callback request; the gateway path
/// posts to the interaction callback endpoint. Only the first response counts.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<(), RespondError>;
}

/// Errors from [`InteractionResponder::respond`]
#[derive(Debug, thiserror::Error)]
pub enum RespondError {
    #[error("interaction was already responded to")]
    AlreadyResponded,

    #[error("response window expired")]
    Expired,

    #[error("no responder attached to this interaction")]
    NoResponder,

    #[error("failed to deliver response: {0}")]
    Delivery(String),
}
