use corvid_core::events::{PresenceUpdate, UserUpdate, VoiceStateUpdate};

use super::UpdateCache;
use crate::cache::InMemoryCache;
use crate::config::ResourceType;

impl UpdateCache for PresenceUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        if !cache.wants(ResourceType::PRESENCE) {
            return;
        }
        let Some(guild_id) = self.presence.guild_id else {
            return;
        };
        if let Some(cached) = cache.write().guilds.get_mut(&guild_id) {
            self.before = cached
                .presences
                .insert(self.presence.user_id(), self.presence.clone());
        }
    }
}

impl UpdateCache for VoiceStateUpdate {
    /// A state without a channel means the user left voice
    fn update(&mut self, cache: &InMemoryCache) {
        let Some(guild_id) = self.state.guild_id else {
            return;
        };
        let mut state = cache.write();
        if cache.wants(ResourceType::MEMBER) {
            if let Some(member) = self.state.member.clone() {
                state.upsert_member(guild_id, member);
            }
        }
        if !cache.wants(ResourceType::VOICE_STATE) {
            return;
        }
        let Some(cached) = state.guilds.get_mut(&guild_id) else {
            return;
        };
        let user_id = self.state.user_id;
        self.before = if self.state.channel_id.is_some() {
            let mut stored = self.state.clone();
            stored.member = None;
            cached.voice_states.insert(user_id, stored)
        } else {
            cached.voice_states.remove(&user_id)
        };
    }
}

impl UpdateCache for UserUpdate {
    fn update(&mut self, cache: &InMemoryCache) {
        let mut state = cache.write();
        if cache.wants(ResourceType::CURRENT_USER) {
            self.before = state.current_user.replace(self.user.clone());
        }
        if let Some(user) = state.users.get_mut(&self.user.id) {
            *user = self.user.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use corvid_core::events::GuildCreate;
    use corvid_core::{Event, Guild, Presence, Snowflake, Status, User, VoiceState};
    use serde_json::json;

    fn cache_with_guild(config: CacheConfig) -> InMemoryCache {
        let cache = InMemoryCache::with_config(config);
        let guild = Guild::new(Snowflake::new(1), "rookery", Snowflake::new(1));
        cache.update(&mut Event::GuildCreate(GuildCreate { guild }));
        cache
    }

    fn voice(channel_id: Option<u64>) -> VoiceState {
        serde_json::from_value(json!({
            "guild_id": "1",
            "channel_id": channel_id.map(|id| id.to_string()),
            "user_id": "50",
            "session_id": "s",
            "member": {"user": {"id": "50", "username": "raven"}}
        }))
        .unwrap()
    }

    fn presence(status: &str) -> Presence {
        serde_json::from_value(json!({
            "user": {"id": "50"}, "guild_id": "1", "status": status
        }))
        .unwrap()
    }

    #[test]
    fn test_voice_join_move_leave() {
        let cache = cache_with_guild(CacheConfig::default());
        let guild_id = Snowflake::new(1);
        let user_id = Snowflake::new(50);

        let mut join = VoiceStateUpdate {
            state: voice(Some(10)),
            before: None,
        };
        join.update(&cache);
        assert!(join.before.is_none());
        assert_eq!(
            cache.voice_channel_states(guild_id, Snowflake::new(10)).unwrap().len(),
            1
        );
        // the embedded member was cached too
        assert!(cache.member(guild_id, user_id).is_ok());

        let mut moved = VoiceStateUpdate {
            state: voice(Some(11)),
            before: None,
        };
        moved.update(&cache);
        assert_eq!(moved.before.unwrap().channel_id, Some(Snowflake::new(10)));

        let mut leave = VoiceStateUpdate {
            state: voice(None),
            before: None,
        };
        leave.update(&cache);
        assert_eq!(leave.before.unwrap().channel_id, Some(Snowflake::new(11)));
        assert!(cache.voice_state(guild_id, user_id).is_err());
    }

    #[test]
    fn test_presence_upsert() {
        let config = CacheConfig::default().resources(crate::config::ResourceType::all());
        let cache = cache_with_guild(config);

        let mut first = PresenceUpdate {
            presence: presence("online"),
            before: None,
        };
        first.update(&cache);
        assert!(first.before.is_none());

        let mut second = PresenceUpdate {
            presence: presence("idle"),
            before: None,
        };
        second.update(&cache);
        assert_eq!(second.before.unwrap().status, Status::Online);
        assert_eq!(
            cache.presence(Snowflake::new(1), Snowflake::new(50)).unwrap().status,
            Status::Idle
        );
    }

    #[test]
    fn test_presence_ignored_when_disabled() {
        let cache = cache_with_guild(CacheConfig::default());
        PresenceUpdate {
            presence: presence("online"),
            before: None,
        }
        .update(&cache);
        assert_eq!(cache.stats().presences, 0);
    }

    #[test]
    fn test_user_update_replaces_current_user() {
        let cache = InMemoryCache::new();
        let mut first = UserUpdate {
            user: User::new(Snowflake::new(1), "corvid"),
            before: None,
        };
        first.update(&cache);
        assert!(first.before.is_none());

        let mut renamed = UserUpdate {
            user: User::new(Snowflake::new(1), "corvus"),
            before: None,
        };
        renamed.update(&cache);
        assert_eq!(renamed.before.unwrap().username, "corvid");
        assert_eq!(cache.current_user().unwrap().username, "corvus");
    }
}
