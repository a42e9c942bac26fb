use corvid_core::events::{GuildMemberAdd, GuildMemberRemove, GuildMemberUpdate, GuildMembersChunk};

use super::UpdateCache;
use crate::cache::InMemoryCache;
use crate::config::ResourceType;

impl UpdateCache for GuildMemberAdd {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if let Some(cached) = state.guilds.get_mut(&self.guild_id) {
            if let Some(count) = cached.guild.member_count.as_mut() {
                *count += 1;
            }
        }
        if cache.wants(ResourceType::MEMBER) {
            state.upsert_member(self.guild_id, self.member.clone());
        }
    }
}

impl UpdateCache for GuildMemberUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if cache.wants(ResourceType::MEMBER) {
            self.before = cache.write().upsert_member(self.guild_id, self.member.clone());
        }
    }
}

impl UpdateCache for GuildMemberRemove {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if let Some(cached) = state.guilds.get_mut(&self.guild_id) {
            if let Some(count) = cached.guild.member_count.as_mut() {
                *count = count.saturating_sub(1);
            }
            cached.presences.remove(&self.user.id);
            cached.voice_states.remove(&self.user.id);
        }
        self.before = state.remove_member(self.guild_id, self.user.id);
    }
}

impl UpdateCache for GuildMembersChunk {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if cache.wants(ResourceType::MEMBER) {
            for member in &self.members {
                state.upsert_member(self.guild_id, member.clone());
            }
        }
        if cache.wants(ResourceType::PRESENCE) {
            if let Some(cached) = state.guilds.get_mut(&self.guild_id) {
                for presence in &self.presences {
                    let mut presence = presence.clone();
                    presence.guild_id = Some(self.guild_id);
                    cached.presences.insert(presence.user_id(), presence);
                }
            }
        }
    }
}
