//! In-memory cache
//!
//! Readers take a shared lock and get owned snapshots; only the event path
//! takes the write lock, so a reader never observes a half-applied event.

use corvid_core::{
    Channel, Emoji, Event, Guild, Member, Message, ModelError, Presence, Role, Snowflake, User,
    VoiceState,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::config::{CacheConfig, ResourceType};
use crate::state::{CacheState, CachedGuild};
use crate::stats::CacheStats;
use crate::update::UpdateCache;

/// Shard that owns `guild_id` among `shard_count` shards
#[inline]
pub fn shard_for_guild(guild_id: Snowflake, shard_count: u32) -> u32 {
    let count = u64::from(shard_count.max(1));
    // remainder is below shard_count
    #[allow(clippy::cast_possible_truncation)]
    let shard = ((guild_id.get() >> 22) % count) as u32;
    shard
}

/// Cache of the entities seen on the gateway
#[derive(Debug, Default)]
pub struct InMemoryCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write()
    }

    #[inline]
    pub(crate) fn wants(&self, resource: ResourceType) -> bool {
        self.config.wants(resource)
    }

    fn require(&self, resource: ResourceType) -> Result<(), ModelError> {
        if self.wants(resource) {
            Ok(())
        } else {
            Err(ModelError::ResourceDisabled(resource.name()))
        }
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Apply an event and fill its `before` snapshot
    ///
    /// Deletions are applied here, so by the time handlers see the event the
    /// entity is already gone.
    pub fn update(&self, event: &mut Event) {
        event.update(self);
    }

    /// Apply an event received on `shard_id`, refusing guilds owned by another shard
    pub fn update_from_shard(
        &self,
        event: &mut Event,
        shard_id: u32,
        shard_count: u32,
    ) -> Result<(), ModelError> {
        if let Some(guild_id) = event.guild_id() {
            let owner = shard_for_guild(guild_id, shard_count);
            if owner != shard_id {
                warn!(%guild_id, shard_id, owner, kind = %event.kind(), "Guild event on wrong shard");
                return Err(ModelError::WrongShard {
                    guild_id,
                    shard_id,
                    owner,
                });
            }
            if matches!(event, Event::GuildCreate(_)) {
                self.write().guild_shards.insert(guild_id, shard_id);
            }
        }
        if let Event::Ready(ready) = event {
            let mut state = self.write();
            for guild in &ready.guilds {
                state.guild_shards.insert(guild.id, shard_id);
            }
        }
        self.update(event);
        Ok(())
    }

    /// Drop every cached entity
    pub fn clear(&self) {
        *self.write() = CacheState::default();
        debug!("Cache cleared");
    }

    /// Drop the guilds delivered by one shard, before it re-identifies
    pub fn clear_shard(&self, shard_id: u32) {
        let mut state = self.write();
        let owned: Vec<Snowflake> = state
            .guild_shards
            .iter()
            .filter(|(_, shard)| **shard == shard_id)
            .map(|(guild_id, _)| *guild_id)
            .collect();
        for guild_id in &owned {
            state.remove_guild(*guild_id);
        }
        debug!(shard_id, guilds = owned.len(), "Shard guilds cleared");
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn current_user(&self) -> Option<User> {
        self.read().current_user.clone()
    }

    /// Guild scalars; collections are read through the dedicated queries
    pub fn guild(&self, guild_id: Snowflake) -> Result<Guild, ModelError> {
        self.require(ResourceType::GUILD)?;
        self.read()
            .guilds
            .get(&guild_id)
            .map(|g| g.guild.clone())
            .ok_or(ModelError::GuildNotFound(guild_id))
    }

    pub fn guild_ids(&self) -> Vec<Snowflake> {
        self.read().guilds.keys().copied().collect()
    }

    /// True while the guild is known but in an outage or not yet delivered
    pub fn is_unavailable(&self, guild_id: Snowflake) -> bool {
        self.read()
            .guilds
            .get(&guild_id)
            .is_some_and(|g| g.guild.unavailable)
    }

    pub fn guild_shard(&self, guild_id: Snowflake) -> Option<u32> {
        self.read().guild_shards.get(&guild_id).copied()
    }

    /// Guild channel, thread, or DM
    pub fn channel(&self, channel_id: Snowflake) -> Result<Channel, ModelError> {
        self.require(ResourceType::CHANNEL)?;
        self.read()
            .channel(channel_id)
            .cloned()
            .ok_or(ModelError::ChannelNotFound(channel_id))
    }

    /// Channels of a guild sorted by position; threads excluded
    pub fn guild_channels(&self, guild_id: Snowflake) -> Result<Vec<Channel>, ModelError> {
        self.require(ResourceType::CHANNEL)?;
        let mut channels = self.with_guild(guild_id, |g| {
            g.channels.values().cloned().collect::<Vec<_>>()
        })?;
        channels.sort_by_key(|c| (c.position.unwrap_or(i32::MAX), c.id));
        Ok(channels)
    }

    pub fn guild_threads(&self, guild_id: Snowflake) -> Result<Vec<Channel>, ModelError> {
        self.require(ResourceType::CHANNEL)?;
        self.with_guild(guild_id, |g| g.threads.values().cloned().collect())
    }

    pub fn private_channels(&self) -> Vec<Channel> {
        self.read().private_channels.values().cloned().collect()
    }

    pub fn role(&self, guild_id: Snowflake, role_id: Snowflake) -> Result<Role, ModelError> {
        self.require(ResourceType::ROLE)?;
        self.with_guild(guild_id, |g| g.roles.get(&role_id).cloned())?
            .ok_or(ModelError::RoleNotFound(role_id))
    }

    /// Roles of a guild, highest position first
    pub fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Role>, ModelError> {
        self.require(ResourceType::ROLE)?;
        let mut roles =
            self.with_guild(guild_id, |g| g.roles.values().cloned().collect::<Vec<_>>())?;
        roles.sort_by(|a, b| b.position.cmp(&a.position).then(a.id.cmp(&b.id)));
        Ok(roles)
    }

    pub fn guild_emojis(&self, guild_id: Snowflake) -> Result<Vec<Emoji>, ModelError> {
        self.require(ResourceType::EMOJI)?;
        self.with_guild(guild_id, |g| g.emojis.clone())
    }

    /// Member with its shared user attached
    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Result<Member, ModelError> {
        self.require(ResourceType::MEMBER)?;
        let state = self.read();
        let guild = state
            .guilds
            .get(&guild_id)
            .ok_or(ModelError::GuildNotFound(guild_id))?;
        let member = guild
            .members
            .get(&user_id)
            .cloned()
            .ok_or(ModelError::MemberNotFound { guild_id, user_id })?;
        Ok(state.hydrate(user_id, member))
    }

    pub fn guild_members(&self, guild_id: Snowflake) -> Result<Vec<Member>, ModelError> {
        self.require(ResourceType::MEMBER)?;
        let state = self.read();
        let guild = state
            .guilds
            .get(&guild_id)
            .ok_or(ModelError::GuildNotFound(guild_id))?;
        Ok(guild
            .members
            .iter()
            .map(|(user_id, member)| state.hydrate(*user_id, member.clone()))
            .collect())
    }

    pub fn user(&self, user_id: Snowflake) -> Result<User, ModelError> {
        self.require(ResourceType::USER)?;
        let state = self.read();
        state
            .users
            .get(&user_id)
            .or_else(|| state.current_user.as_ref().filter(|u| u.id == user_id))
            .cloned()
            .ok_or(ModelError::UserNotFound(user_id))
    }

    pub fn message(&self, channel_id: Snowflake, message_id: Snowflake) -> Result<Message, ModelError> {
        self.require(ResourceType::MESSAGE)?;
        self.read()
            .messages
            .get(&channel_id)
            .and_then(|ring| ring.get(message_id))
            .cloned()
            .ok_or(ModelError::MessageNotFound(message_id))
    }

    /// Cached messages of a channel, oldest first
    pub fn channel_messages(&self, channel_id: Snowflake) -> Result<Vec<Message>, ModelError> {
        self.require(ResourceType::MESSAGE)?;
        Ok(self
            .read()
            .messages
            .get(&channel_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn voice_state(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<VoiceState, ModelError> {
        self.require(ResourceType::VOICE_STATE)?;
        self.with_guild(guild_id, |g| g.voice_states.get(&user_id).cloned())?
            .ok_or(ModelError::VoiceStateNotFound { guild_id, user_id })
    }

    /// Users currently connected to a voice channel
    pub fn voice_channel_states(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> Result<Vec<VoiceState>, ModelError> {
        self.require(ResourceType::VOICE_STATE)?;
        self.with_guild(guild_id, |g| {
            g.voice_states
                .values()
                .filter(|v| v.channel_id == Some(channel_id))
                .cloned()
                .collect()
        })
    }

    pub fn presence(&self, guild_id: Snowflake, user_id: Snowflake) -> Result<Presence, ModelError> {
        self.require(ResourceType::PRESENCE)?;
        self.with_guild(guild_id, |g| g.presences.get(&user_id).cloned())?
            .ok_or(ModelError::PresenceNotFound { guild_id, user_id })
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read();
        let guilds = state.guilds.values();
        CacheStats {
            guilds: state.guilds.len(),
            unavailable_guilds: guilds.clone().filter(|g| g.guild.unavailable).count(),
            channels: guilds.clone().map(|g| g.channels.len()).sum::<usize>()
                + state.private_channels.len(),
            threads: guilds.clone().map(|g| g.threads.len()).sum(),
            roles: guilds.clone().map(|g| g.roles.len()).sum(),
            emojis: guilds.clone().map(|g| g.emojis.len()).sum(),
            members: guilds.clone().map(|g| g.members.len()).sum(),
            users: state.users.len(),
            messages: state.messages.values().map(crate::ring::MessageRing::len).sum(),
            voice_states: guilds.clone().map(|g| g.voice_states.len()).sum(),
            presences: guilds.map(|g| g.presences.len()).sum(),
        }
    }

    fn with_guild<T>(
        &self,
        guild_id: Snowflake,
        f: impl FnOnce(&CachedGuild) -> T,
    ) -> Result<T, ModelError> {
        self.read()
            .guilds
            .get(&guild_id)
            .map(f)
            .ok_or(ModelError::GuildNotFound(guild_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::events::{ChannelCreate, GuildCreate};
    use serde_json::json;

    fn guild_event(id: u64) -> Event {
        let guild: Guild = serde_json::from_value(json!({
            "id": id.to_string(),
            "name": "rookery",
            "owner_id": "1",
            "member_count": 1,
            "channels": [
                {"id": "20", "type": 0, "name": "b", "position": 2},
                {"id": "10", "type": 0, "name": "a", "position": 1}
            ],
            "roles": [
                {"id": id.to_string(), "name": "@everyone", "position": 0},
                {"id": "30", "name": "mods", "position": 3}
            ],
            "members": [{"user": {"id": "50", "username": "raven"}, "roles": ["30"]}]
        }))
        .unwrap();
        Event::GuildCreate(GuildCreate { guild })
    }

    #[test]
    fn test_shard_for_guild() {
        let guild_id = Snowflake::new(5 << 22);
        assert_eq!(shard_for_guild(guild_id, 2), 1);
        assert_eq!(shard_for_guild(guild_id, 5), 0);
        assert_eq!(shard_for_guild(guild_id, 0), 0);
    }

    #[test]
    fn test_queries_after_guild_create() {
        let cache = InMemoryCache::new();
        cache.update(&mut guild_event(1));

        let guild = cache.guild(Snowflake::new(1)).unwrap();
        assert_eq!(guild.name, "rookery");
        assert!(guild.channels.is_empty());

        let channels = cache.guild_channels(Snowflake::new(1)).unwrap();
        let ids: Vec<u64> = channels.iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![10, 20]);

        let roles = cache.guild_roles(Snowflake::new(1)).unwrap();
        assert_eq!(roles[0].name, "mods");

        let member = cache.member(Snowflake::new(1), Snowflake::new(50)).unwrap();
        assert_eq!(member.user.unwrap().username, "raven");
        assert_eq!(cache.channel(Snowflake::new(10)).unwrap().guild_id, Some(Snowflake::new(1)));
    }

    #[test]
    fn test_miss_sentinels() {
        let cache = InMemoryCache::new();
        assert!(matches!(
            cache.guild(Snowflake::new(9)),
            Err(ModelError::GuildNotFound(_))
        ));
        assert!(matches!(
            cache.channel(Snowflake::new(9)),
            Err(ModelError::ChannelNotFound(_))
        ));
        assert!(matches!(
            cache.member(Snowflake::new(9), Snowflake::new(1)),
            Err(ModelError::GuildNotFound(_))
        ));
    }

    #[test]
    fn test_disabled_resources() {
        let cache = InMemoryCache::new();
        let err = cache.message(Snowflake::new(1), Snowflake::new(2)).unwrap_err();
        assert!(matches!(err, ModelError::ResourceDisabled("messages")));

        let err = cache.presence(Snowflake::new(1), Snowflake::new(2)).unwrap_err();
        assert!(matches!(err, ModelError::ResourceDisabled("presences")));
    }

    #[test]
    fn test_update_from_wrong_shard_is_rejected() {
        let cache = InMemoryCache::new();
        let guild_id = 5u64 << 22;

        let err = cache
            .update_from_shard(&mut guild_event(guild_id), 0, 2)
            .unwrap_err();
        assert!(matches!(err, ModelError::WrongShard { shard_id: 0, owner: 1, .. }));
        assert!(cache.guild_ids().is_empty());

        cache.update_from_shard(&mut guild_event(guild_id), 1, 2).unwrap();
        assert_eq!(cache.guild_shard(Snowflake::new(guild_id)), Some(1));
    }

    #[test]
    fn test_clear_shard_keeps_other_shards() {
        let cache = InMemoryCache::new();
        let on_zero = 4u64 << 22;
        let on_one = 5u64 << 22;
        cache.update_from_shard(&mut guild_event(on_zero), 0, 2).unwrap();
        cache.update_from_shard(&mut guild_event(on_one), 1, 2).unwrap();

        cache.clear_shard(0);
        assert_eq!(cache.guild_ids(), vec![Snowflake::new(on_one)]);
    }

    #[test]
    fn test_private_channel_events_have_no_shard_owner() {
        let cache = InMemoryCache::new();
        let dm = Channel::new_dm(Snowflake::new(70), User::new(Snowflake::new(5), "raven"));
        let mut event = Event::ChannelCreate(ChannelCreate { channel: dm });
        cache.update_from_shard(&mut event, 3, 4).unwrap();
        assert_eq!(cache.private_channels().len(), 1);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = InMemoryCache::new();
        cache.update(&mut guild_event(1));

        let stats = cache.stats();
        assert_eq!(stats.guilds, 1);
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.roles, 2);
        assert_eq!(stats.members, 1);
        assert_eq!(stats.users, 1);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
