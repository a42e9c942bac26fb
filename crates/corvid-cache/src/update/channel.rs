use corvid_core::events::{
    ChannelCreate, ChannelDelete, ChannelUpdate, ThreadCreate, ThreadDelete, ThreadUpdate,
};
use corvid_core::Channel;

use super::UpdateCache;
use crate::cache::InMemoryCache;
use crate::config::ResourceType;
use crate::state::CacheState;

/// Insert a guild or private channel, returning what it replaced
fn upsert(state: &mut CacheState, channel: &Channel) -> Option<Channel> {
    match channel.guild_id {
        Some(guild_id) if !channel.is_private() => state.upsert_channel(guild_id, channel.clone()),
        _ => state.private_channels.insert(channel.id, channel.clone()),
    }
}

impl UpdateCache for ChannelCreate {
    fn update(&mut self, cache: &InMemoryCache) {
        if cache.wants(ResourceType::CHANNEL) {
            upsert(&mut cache.write(), &self.channel);
        }
    }
}

impl UpdateCache for ChannelUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if cache.wants(ResourceType::CHANNEL) {
            self.before = upsert(&mut cache.write(), &self.channel);
        }
    }
}

impl UpdateCache for ChannelDelete {
    fn update(&mut self, cache: &InMemoryCache) {
        self.before = cache.write().remove_channel(self.channel.id);
    }
}

impl UpdateCache for ThreadCreate {
    fn update(&mut self, cache: &InMemoryCache) {
        if cache.wants(ResourceType::CHANNEL) {
            upsert(&mut cache.write(), &self.thread);
        }
    }
}

impl UpdateCache for ThreadUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if cache.wants(ResourceType::CHANNEL) {
            self.before = upsert(&mut cache.write(), &self.thread);
        }
    }
}

impl UpdateCache for ThreadDelete {
    fn update(&mut self, cache: &InMemoryCache) {
        self.before = cache.write().remove_channel(self.id);
    }
}
