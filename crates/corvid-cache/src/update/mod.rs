//! Event application
//!
//! Each payload knows how to apply itself. Update and delete payloads store
//! the prior cached state in their `before` field while doing so.

mod channel;
mod guild;
mod member;
mod message;
mod presence;

use corvid_core::Event;

use crate::cache::InMemoryCache;

/// Apply a payload to the cache, filling its `before` snapshot
pub trait UpdateCache {
    fn update(&mut self, cache: &InMemoryCache);
}

impl UpdateCache for Event {
    fn update(&mut self, cache: &InMemoryCache) {
        match self {
            Self::Ready(e) => e.update(cache),
            Self::GuildCreate(e) => e.update(cache),
            Self::GuildUpdate(e) => e.update(cache),
            Self::GuildDelete(e) => e.update(cache),
            Self::GuildRoleCreate(e) => e.update(cache),
            Self::GuildRoleUpdate(e) => e.update(cache),
            Self::GuildRoleDelete(e) => e.update(cache),
            Self::GuildEmojisUpdate(e) => e.update(cache),
            Self::GuildMemberAdd(e) => e.update(cache),
            Self::GuildMemberUpdate(e) => e.update(cache),
            Self::GuildMemberRemove(e) => e.update(cache),
            Self::GuildMembersChunk(e) => e.update(cache),
            Self::ChannelCreate(e) => e.update(cache),
            Self::ChannelUpdate(e) => e.update(cache),
            Self::ChannelDelete(e) => e.update(cache),
            Self::ThreadCreate(e) => e.update(cache),
            Self::ThreadUpdate(e) => e.update(cache),
            Self::ThreadDelete(e) => e.update(cache),
            Self::MessageCreate(e) => e.update(cache),
            Self::MessageUpdate(e) => e.update(cache),
            Self::MessageDelete(e) => e.update(cache),
            Self::MessageDeleteBulk(e) => e.update(cache),
            Self::PresenceUpdate(e) => e.update(cache),
            Self::VoiceStateUpdate(e) => e.update(cache),
            Self::UserUpdate(e) => e.update(cache),
            // Nothing cached
            Self::Resumed(_)
            | Self::MessageReactionAdd(_)
            | Self::MessageReactionRemove(_)
            | Self::TypingStart(_)
            | Self::VoiceServerUpdate(_)
            | Self::InteractionCreate(_)
            | Self::Connect(_)
            | Self::Disconnect(_)
            | Self::RateLimit(_)
            | Self::Unknown(_) => {}
        }
    }
}
