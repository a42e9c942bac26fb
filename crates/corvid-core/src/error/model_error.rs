//! Model errors - decode failures and cache-miss sentinels

use thiserror::Error;

use crate::events::EventKind;
use crate::value_objects::Snowflake;

/// Errors raised by the platform model
#[derive(Debug, Error)]
pub enum ModelError {
    // =========================================================================
    // Not Found (cache misses)
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(Snowflake),

    #[error("Guild not found: {0}")]
    GuildNotFound(Snowflake),

    #[error("Channel not found: {0}")]
    ChannelNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    #[error("Role not found: {0}")]
    RoleNotFound(Snowflake),

    #[error("Member {user_id} not found in guild {guild_id}")]
    MemberNotFound {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    #[error("Voice state for {user_id} not found in guild {guild_id}")]
    VoiceStateNotFound {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    #[error("Presence for {user_id} not found in guild {guild_id}")]
    PresenceNotFound {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    /// The collection is disabled in the cache configuration
    #[error("Cache resource disabled: {0}")]
    ResourceDisabled(&'static str),

    // =========================================================================
    // Decode Errors
    // =========================================================================
    #[error("Failed to decode {kind} payload: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is produced locally and cannot be decoded from a dispatch")]
    NotDispatchable(EventKind),

    /// A guild event arrived on a shard that does not own the guild
    #[error("Guild {guild_id} arrived on shard {shard_id}, owned by shard {owner}")]
    WrongShard {
        guild_id: Snowflake,
        shard_id: u32,
        owner: u32,
    },
}

impl ModelError {
    /// Check if this is a cache-miss sentinel
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::GuildNotFound(_)
                | Self::ChannelNotFound(_)
                | Self::MessageNotFound(_)
                | Self::RoleNotFound(_)
                | Self::MemberNotFound { .. }
                | Self::VoiceStateNotFound { .. }
                | Self::PresenceNotFound { .. }
                | Self::ResourceDisabled(_)
        )
    }
}
