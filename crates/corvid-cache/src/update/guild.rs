use corvid_core::events::{
    GuildCreate, GuildDelete, GuildEmojisUpdate, GuildRoleCreate, GuildRoleDelete,
    GuildRoleUpdate, GuildUpdate, Ready,
};
use tracing::debug;

use super::UpdateCache;
use crate::cache::InMemoryCache;
use crate::config::ResourceType;
use crate::state::CachedGuild;

impl UpdateCache for Ready {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if cache.wants(ResourceType::CURRENT_USER) {
            state.current_user = Some(self.user.clone());
        }
        if cache.wants(ResourceType::GUILD) {
            // Other shards' guilds stay; this shard's arrive as stubs
            for stub in &self.guilds {
                state
                    .guilds
                    .entry(stub.id)
                    .or_insert_with(|| CachedGuild::unavailable(stub.id));
            }
        }
    }
}

impl UpdateCache for GuildCreate {
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::GUILD) {
            return;
        }
        let guild = &self.guild;
        let guild_id = guild.id;
        let mut state = cache.write();

        state.clear_guild_collections(guild_id);
        let mut scalars = guild.clone();
        scalars.unavailable = false;
        state.guilds.insert(guild_id, CachedGuild::new(scalars));

        if cache.wants(ResourceType::CHANNEL) {
            for channel in guild.channels.iter().chain(&guild.threads) {
                state.upsert_channel(guild_id, channel.clone());
            }
        }
        if cache.wants(ResourceType::MEMBER) {
            for member in &guild.members {
                state.upsert_member(guild_id, member.clone());
            }
        }

        let Some(cached) = state.guilds.get_mut(&guild_id) else {
            return;
        };
        if cache.wants(ResourceType::ROLE) {
            cached.roles = guild.roles.iter().map(|r| (r.id, r.clone())).collect();
        }
        if cache.wants(ResourceType::EMOJI) {
            cached.emojis.clone_from(&guild.emojis);
        }
        if cache.wants(ResourceType::VOICE_STATE) {
            cached.voice_states = guild
                .voice_states
                .iter()
                .filter(|v| v.channel_id.is_some())
                .map(|v| {
                    let mut state = v.clone();
                    state.guild_id = Some(guild_id);
                    (state.user_id, state)
                })
                .collect();
        }
        if cache.wants(ResourceType::PRESENCE) {
            cached.presences = guild
                .presences
                .iter()
                .map(|p| {
                    let mut presence = p.clone();
                    presence.guild_id = Some(guild_id);
                    (presence.user_id(), presence)
                })
                .collect();
        }
        debug!(%guild_id, members = cached.members.len(), "Guild cached");
    }
}

impl UpdateCache for GuildUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::GUILD) {
            return;
        }
        let mut state = cache.write();
        if let Some(cached) = state.guilds.get_mut(&self.guild.id) {
            self.before = Some(cached.guild.clone());
            cached.guild.merge_scalars(&self.guild);
        }
    }
}

impl UpdateCache for GuildDelete {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if self.unavailable {
            if let Some(cached) = state.guilds.get_mut(&self.id) {
                self.before = Some(cached.guild.clone());
                cached.guild.unavailable = true;
            }
            return;
        }
        self.before = state.remove_guild(self.id).map(|g| g.guild);
    }
}

impl UpdateCache for GuildRoleCreate {
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::ROLE) {
            return;
        }
        if let Some(cached) = cache.write().guilds.get_mut(&self.guild_id) {
            cached.roles.insert(self.role.id, self.role.clone());
        }
    }
}

impl UpdateCache for GuildRoleUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::ROLE) {
            return;
        }
        if let Some(cached) = cache.write().guilds.get_mut(&self.guild_id) {
            self.before = cached.roles.insert(self.role.id, self.role.clone());
        }
    }
}

impl UpdateCache for GuildRoleDelete {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        let Some(cached) = state.guilds.get_mut(&self.guild_id) else {
            return;
        };
        self.before = cached.roles.remove(&self.role_id);
        for member in cached.members.values_mut() {
            member.roles.retain(|id| *id != self.role_id);
        }
    }
}

impl UpdateCache for GuildEmojisUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::EMOJI) {
            return;
        }
        if let Some(cached) = cache.write().guilds.get_mut(&self.guild_id) {
            self.before = Some(std::mem::replace(&mut cached.emojis, self.emojis.clone()));
        }
    }
}
