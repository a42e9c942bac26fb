//! Responder that completes the pending ingress request

use async_trait::async_trait;
use corvid_core::{Interaction, InteractionResponder, InteractionResponse, RespondError};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Hands the first response back to the waiting HTTP request
///
/// Responses after `window` has elapsed fail with [`RespondError::Expired`];
/// a second response fails with [`RespondError::AlreadyResponded`].
#[derive(Debug)]
pub struct CallbackResponder {
    slot: Mutex<Option<oneshot::Sender<InteractionResponse>>>,
    deadline: Instant,
}

impl CallbackResponder {
    pub fn new(window: Duration) -> (Self, oneshot::Receiver<InteractionResponse>) {
        let (tx, rx) = oneshot::channel();
        let responder = Self {
            slot: Mutex::new(Some(tx)),
            deadline: Instant::now() + window,
        };
        (responder, rx)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[async_trait]
impl InteractionResponder for CallbackResponder {
    async fn respond(
        &self,
        _interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<(), RespondError> {
        let sender = self.slot.lock().take().ok_or(RespondError::AlreadyResponded)?;
        if self.is_expired() {
            return Err(RespondError::Expired);
        }
        // receiver gone means the ingress already answered 408
        sender.send(response).map_err(|_| RespondError::Expired)
    }
}
