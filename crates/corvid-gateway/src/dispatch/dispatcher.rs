//! Event dispatcher
//!
//! Applies each gateway event to the cache, then fans it out to handlers.
//! Synthetic events and interactions from the HTTP ingress skip the cache.

use async_trait::async_trait;
use corvid_core::events::{InteractionCreate, RateLimit};
use corvid_core::{Event, Interaction, InteractionResponder, InteractionResponse, RespondError};
use corvid_http::HttpClient;
use corvid_interactions::InteractionSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{Context, HandlerRegistry, Shared};
use crate::shard::ShardId;

/// Routes events into the cache and on to registered handlers
#[derive(Debug)]
pub struct Dispatcher {
    registry: HandlerRegistry,
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            shared,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Handle a dispatch received on `shard`
    ///
    /// The cache is updated before any handler is queued, so handlers see
    /// deletions already applied and `before` snapshots filled in.
    pub fn dispatch(&self, shard: ShardId, mut event: Event) {
        if let Event::InteractionCreate(interaction) = &mut event {
            if interaction.responder.is_none() {
                interaction.responder = Some(Arc::new(CallbackResponder::new(
                    self.shared.http.clone(),
                )));
            }
        }

        let cache = &self.shared.cache;
        if matches!(event, Event::Ready(_)) {
            cache.clear_shard(shard.index);
        }
        if let Err(e) = cache.update_from_shard(&mut event, shard.index, shard.count) {
            // still delivered, without cache state
            debug!(shard = %shard, error = %e, "Cache update skipped");
        }

        trace!(shard = %shard, kind = %event.kind(), "Dispatching event");
        let ctx = Context::new(Arc::clone(&self.shared), Some(shard));
        self.registry.fan_out(&ctx, &event);
    }

    /// Deliver an event that did not come from a gateway dispatch
    pub fn emit(&self, shard: Option<ShardId>, event: Event) {
        trace!(kind = %event.kind(), "Emitting event");
        let ctx = Context::new(Arc::clone(&self.shared), shard);
        self.registry.fan_out(&ctx, &event);
    }

    /// Forward REST rate-limit notices as `RateLimit` events until the sender closes
    pub(crate) async fn forward_ratelimits(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<RateLimit>) {
        while let Some(notice) = rx.recv().await {
            self.emit(None, Event::RateLimit(notice));
        }
    }

    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.registry.wait_idle(timeout).await
    }
}

impl InteractionSink for Dispatcher {
    fn deliver(&self, event: InteractionCreate) {
        self.emit(None, Event::InteractionCreate(event));
    }
}

/// Answers gateway interactions through the REST callback endpoint
struct CallbackResponder {
    http: HttpClient,
    responded: AtomicBool,
}

impl CallbackResponder {
    fn new(http: HttpClient) -> Self {
        Self {
            http,
            responded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl InteractionResponder for CallbackResponder {
    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<(), RespondError> {
        if self.responded.swap(true, Ordering::AcqRel) {
            return Err(RespondError::AlreadyResponded);
        }
        self.http
            .create_interaction_response(interaction.id, &interaction.token, &response)
            .await
            .map_err(|e| RespondError::Delivery(e.to_string()))
    }
}
