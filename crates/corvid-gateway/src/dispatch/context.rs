//! Handle passed to every event handler

use corvid_cache::InMemoryCache;
use corvid_core::events::InteractionCreate;
use corvid_core::{InteractionResponse, Snowflake};
use corvid_http::HttpClient;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{Error, GatewayError};
use crate::protocol::{PresenceUpdatePayload, RequestGuildMembersPayload, VoiceStateUpdatePayload};
use crate::shard::{Shard, ShardId};

/// Resources owned by a session and shared with handlers
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) http: HttpClient,
    pub(crate) cache: Arc<InMemoryCache>,
    pub(crate) shards: RwLock<BTreeMap<u32, Shard>>,
    pub(crate) shard_count: AtomicU32,
}

impl Shared {
    pub(crate) fn new(http: HttpClient, cache: Arc<InMemoryCache>) -> Self {
        Self {
            http,
            cache,
            shards: RwLock::new(BTreeMap::new()),
            shard_count: AtomicU32::new(1),
        }
    }

    pub(crate) fn shard_count(&self) -> u32 {
        self.shard_count.load(Ordering::Acquire)
    }
}

/// Session view given to handlers: REST, cache, and the shard that delivered the event
#[derive(Debug, Clone)]
pub struct Context {
    shared: Arc<Shared>,
    shard: Option<ShardId>,
}

impl Context {
    pub(crate) fn new(shared: Arc<Shared>, shard: Option<ShardId>) -> Self {
        Self { shared, shard }
    }

    pub fn http(&self) -> &HttpClient {
        &self.shared.http
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.shared.cache
    }

    /// Shard the event arrived on; `None` for events from the HTTP ingress or
    /// the REST layer
    pub fn shard_id(&self) -> Option<ShardId> {
        self.shard
    }

    /// Handle for the shard the event arrived on
    pub fn shard(&self) -> Option<Shard> {
        let id = self.shard?;
        self.shared.shards.read().get(&id.index).cloned()
    }

    /// Handle for the shard that owns `guild_id`, if this process runs it
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> Option<Shard> {
        let id = ShardId::for_guild(guild_id, self.shared.shard_count());
        self.shared.shards.read().get(&id.index).cloned()
    }

    pub fn shards(&self) -> Vec<Shard> {
        self.shared.shards.read().values().cloned().collect()
    }

    /// Send the initial response for an interaction
    ///
    /// Goes through the path that delivered it: the pending ingress request,
    /// or the REST callback endpoint for gateway interactions.
    pub async fn respond(
        &self,
        interaction: &InteractionCreate,
        response: InteractionResponse,
    ) -> Result<(), Error> {
        if interaction.responder.is_some() {
            return interaction.respond(response).await.map_err(Error::from);
        }
        let inner = &interaction.interaction;
        self.shared
            .http
            .create_interaction_response(inner.id, &inner.token, &response)
            .await?;
        Ok(())
    }

    /// Update presence on every shard this process runs
    pub fn update_presence(&self, presence: &PresenceUpdatePayload) -> Result<(), GatewayError> {
        let shards = self.shards();
        if shards.is_empty() {
            return Err(GatewayError::Closed);
        }
        shards
            .iter()
            .try_for_each(|shard| shard.update_presence(presence))
    }

    pub fn update_voice_state(
        &self,
        voice_state: &VoiceStateUpdatePayload,
    ) -> Result<(), GatewayError> {
        self.owning_shard(voice_state.guild_id)?
            .update_voice_state(voice_state)
    }

    /// Returns the nonce carried by the resulting member chunks
    pub fn request_guild_members(
        &self,
        request: RequestGuildMembersPayload,
    ) -> Result<String, GatewayError> {
        self.owning_shard(request.guild_id)?
            .request_guild_members(request)
    }

    fn owning_shard(&self, guild_id: Snowflake) -> Result<Shard, GatewayError> {
        self.shard_for_guild(guild_id).ok_or_else(|| {
            GatewayError::Protocol(format!("guild {guild_id} is on a shard this process does not run"))
        })
    }
}
