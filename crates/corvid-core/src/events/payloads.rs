//! Event payload definitions
//!
//! One struct per event kind. Update and delete payloads carry a `before`
//! snapshot that the cache fills in; it is `None` when nothing was cached.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::entities::{
    Channel, ChannelType, Emoji, Guild, Interaction, InteractionResponse, Member, Message,
    PartialMessage, Presence, Role, UnavailableGuild, User, VoiceState,
};
use crate::traits::{InteractionResponder, RespondError};
use crate::value_objects::Snowflake;

// === Connection Events ===

/// Application stub in READY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyApplication {
    pub id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

/// READY event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    pub v: u8,
    pub user: User,
    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    /// Supersedes the generic gateway URL for resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ReadyApplication>,
}

/// RESUMED event payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resumed {}

// === Guild Events ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildCreate {
    pub guild: Guild,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildUpdate {
    #[serde(flatten)]
    pub guild: Guild,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Guild>,
}

/// GUILD_DELETE event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildDelete {
    pub id: Snowflake,
    /// True for an outage; false or absent when the user left or the guild is gone
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Guild>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleCreate {
    pub guild_id: Snowflake,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleUpdate {
    pub guild_id: Snowflake,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Role>,
}

/// GUILD_EMOJIS_UPDATE replaces the whole emoji set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEmojisUpdate {
    pub guild_id: Snowflake,
    pub emojis: Vec<Emoji>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Vec<Emoji>>,
}

// === Member Events ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMemberAdd {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMemberRemove {
    pub guild_id: Snowflake,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Member>,
}

/// Response to a REQUEST_GUILD_MEMBERS command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMembersChunk {
    pub guild_id: Snowflake,
    pub members: Vec<Member>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_found: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presences: Vec<Presence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

// === Channel Events ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelCreate {
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    #[serde(flatten)]
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDelete {
    #[serde(flatten)]
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCreate {
    #[serde(flatten)]
    pub thread: Channel,
    /// False when the thread was only added to the client's view
    #[serde(default)]
    pub newly_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadUpdate {
    #[serde(flatten)]
    pub thread: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Channel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDelete {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    #[serde(rename = "type", default)]
    pub kind: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Channel>,
}

// === Message Events ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCreate {
    pub message: Message,
}

/// MESSAGE_UPDATE event payload
///
/// `update` holds only the changed fields; [`MessageUpdate::after`] applies
/// them to the cached `before`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdate {
    #[serde(flatten)]
    pub update: PartialMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Message>,
}

impl MessageUpdate {
    /// The message as it looks after the edit, when the prior state was known
    pub fn after(&self) -> Option<Message> {
        self.before.as_ref().map(|before| {
            let mut after = before.clone();
            after.apply_update(&self.update);
            after
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeleteBulk {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    /// Cached messages among `ids`, in `ids` order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReactionAdd {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReactionRemove {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStart {
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    /// Unix seconds
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
}

// === Presence, Voice, User ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    #[serde(flatten)]
    pub presence: Presence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Presence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    #[serde(flatten)]
    pub state: VoiceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<VoiceState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceServerUpdate {
    pub token: String,
    pub guild_id: Snowflake,
    /// `None` while the voice server is being reallocated
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(flatten)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<User>,
}

// === Interactions ===

/// INTERACTION_CREATE, from the gateway or the HTTP ingress
///
/// The responder is attached by whichever path delivered the interaction.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionCreate {
    pub interaction: Interaction,
    #[serde(skip)]
    pub responder: Option<Arc<dyn InteractionResponder>>,
}

impl InteractionCreate {
    #[must_use]
    pub fn new(interaction: Interaction) -> Self {
        Self {
            interaction,
            responder: None,
        }
    }

    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn InteractionResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Send the initial response through the delivering path
    pub async fn respond(&self, response: InteractionResponse) -> Result<(), RespondError> {
        match &self.responder {
            Some(responder) => responder.respond(&self.interaction, response).await,
            None => Err(RespondError::NoResponder),
        }
    }
}

impl std::fmt::Debug for InteractionCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionCreate")
            .field("interaction", &self.interaction)
            .field("has_responder", &self.responder.is_some())
            .finish()
    }
}

// === Synthetic Events ===

/// Emitted once a shard reaches READY or RESUMED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connect {
    pub shard_id: u32,
    pub resumed: bool,
}

/// Emitted whenever a shard connection ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    pub shard_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub reason: String,
    pub will_reconnect: bool,
}

/// Emitted when the REST layer observes or waits out a rate limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub retry_after_ms: u64,
    pub global: bool,
}

/// Dispatch with a name the client has no type for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownEvent {
    pub name: String,
    pub data: Value,
}
