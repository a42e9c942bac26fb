//! Event kinds
//!
//! Every dispatch name the client understands, plus the synthetic events the
//! session emits itself and a catch-all for names it does not.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event kind, used as the handler registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // Connection events
    Ready,
    Resumed,

    // Guild events
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    GuildRoleCreate,
    GuildRoleUpdate,
    GuildRoleDelete,
    GuildEmojisUpdate,

    // Member events
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    GuildMembersChunk,

    // Channel events
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    ThreadCreate,
    ThreadUpdate,
    ThreadDelete,

    // Message events
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageDeleteBulk,
    MessageReactionAdd,
    MessageReactionRemove,
    TypingStart,

    // Presence and voice
    PresenceUpdate,
    VoiceStateUpdate,
    VoiceServerUpdate,

    UserUpdate,
    InteractionCreate,

    // Synthetic events, never on the wire
    Connect,
    Disconnect,
    RateLimit,

    /// Dispatch names with no typed payload
    Unknown,
}

impl EventKind {
    /// Get the string representation of the event kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::GuildRoleCreate => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete => "GUILD_ROLE_DELETE",
            Self::GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::ThreadCreate => "THREAD_CREATE",
            Self::ThreadUpdate => "THREAD_UPDATE",
            Self::ThreadDelete => "THREAD_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::TypingStart => "TYPING_START",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::VoiceServerUpdate => "VOICE_SERVER_UPDATE",
            Self::UserUpdate => "USER_UPDATE",
            Self::InteractionCreate => "INTERACTION_CREATE",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::RateLimit => "RATE_LIMIT",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Resolve a dispatch `t` field
    ///
    /// Synthetic names never resolve; they cannot arrive from the wire.
    #[must_use]
    pub fn from_dispatch(name: &str) -> Option<Self> {
        let kind = match name {
            "READY" => Self::Ready,
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate,
            "GUILD_UPDATE" => Self::GuildUpdate,
            "GUILD_DELETE" => Self::GuildDelete,
            "GUILD_ROLE_CREATE" => Self::GuildRoleCreate,
            "GUILD_ROLE_UPDATE" => Self::GuildRoleUpdate,
            "GUILD_ROLE_DELETE" => Self::GuildRoleDelete,
            "GUILD_EMOJIS_UPDATE" => Self::GuildEmojisUpdate,
            "GUILD_MEMBER_ADD" => Self::GuildMemberAdd,
            "GUILD_MEMBER_UPDATE" => Self::GuildMemberUpdate,
            "GUILD_MEMBER_REMOVE" => Self::GuildMemberRemove,
            "GUILD_MEMBERS_CHUNK" => Self::GuildMembersChunk,
            "CHANNEL_CREATE" => Self::ChannelCreate,
            "CHANNEL_UPDATE" => Self::ChannelUpdate,
            "CHANNEL_DELETE" => Self::ChannelDelete,
            "THREAD_CREATE" => Self::ThreadCreate,
            "THREAD_UPDATE" => Self::ThreadUpdate,
            "THREAD_DELETE" => Self::ThreadDelete,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "MESSAGE_UPDATE" => Self::MessageUpdate,
            "MESSAGE_DELETE" => Self::MessageDelete,
            "MESSAGE_DELETE_BULK" => Self::MessageDeleteBulk,
            "MESSAGE_REACTION_ADD" => Self::MessageReactionAdd,
            "MESSAGE_REACTION_REMOVE" => Self::MessageReactionRemove,
            "TYPING_START" => Self::TypingStart,
            "PRESENCE_UPDATE" => Self::PresenceUpdate,
            "VOICE_STATE_UPDATE" => Self::VoiceStateUpdate,
            "VOICE_SERVER_UPDATE" => Self::VoiceServerUpdate,
            "USER_UPDATE" => Self::UserUpdate,
            "INTERACTION_CREATE" => Self::InteractionCreate,
            _ => return None,
        };
        Some(kind)
    }

    /// Check if this kind is produced by the client rather than the gateway
    #[must_use]
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::Connect | Self::Disconnect | Self::RateLimit)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
