//! Cache configuration

use bitflags::bitflags;
use corvid_common::ClientConfig;

bitflags! {
    /// Collections the cache maintains
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u16 {
        const GUILD = 1 << 0;
        const CHANNEL = 1 << 1;
        const ROLE = 1 << 2;
        const EMOJI = 1 << 3;
        const MEMBER = 1 << 4;
        const USER = 1 << 5;
        const MESSAGE = 1 << 6;
        const VOICE_STATE = 1 << 7;
        const PRESENCE = 1 << 8;
        const CURRENT_USER = 1 << 9;
    }
}

impl ResourceType {
    const NAMES: [(Self, &'static str); 10] = [
        (Self::GUILD, "guilds"),
        (Self::CHANNEL, "channels"),
        (Self::ROLE, "roles"),
        (Self::EMOJI, "emojis"),
        (Self::MEMBER, "members"),
        (Self::USER, "users"),
        (Self::MESSAGE, "messages"),
        (Self::VOICE_STATE, "voice_states"),
        (Self::PRESENCE, "presences"),
        (Self::CURRENT_USER, "current_user"),
    ];

    /// Collection name used in [`ModelError::ResourceDisabled`](corvid_core::ModelError)
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(resource, _)| *resource == self)
            .map_or("resources", |&(_, name)| name)
    }
}

/// Cache bounds and enabled collections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub resources: ResourceType,
    /// Message ring size per channel; 0 disables message caching
    pub max_messages_per_channel: usize,
}

impl Default for CacheConfig {
    /// Everything except messages and presences
    fn default() -> Self {
        Self {
            resources: ResourceType::all() - ResourceType::MESSAGE - ResourceType::PRESENCE,
            max_messages_per_channel: 0,
        }
    }
}

impl CacheConfig {
    /// Derive bounds from the client options
    pub fn from_client(config: &ClientConfig) -> Self {
        let mut resources = ResourceType::all();
        resources.set(ResourceType::PRESENCE, config.tracks_presences());
        resources.set(ResourceType::VOICE_STATE, config.track_voice_states);
        resources.set(ResourceType::MESSAGE, config.max_messages_per_channel > 0);
        Self {
            resources,
            max_messages_per_channel: config.max_messages_per_channel,
        }
    }

    #[must_use]
    pub fn resources(mut self, resources: ResourceType) -> Self {
        self.resources = resources;
        self
    }

    /// Enable message caching with `max` messages per channel
    #[must_use]
    pub fn max_messages_per_channel(mut self, max: usize) -> Self {
        self.max_messages_per_channel = max;
        self.resources.set(ResourceType::MESSAGE, max > 0);
        self
    }

    #[inline]
    pub fn wants(&self, resource: ResourceType) -> bool {
        self.resources.contains(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::Intents;

    #[test]
    fn test_default_disables_messages_and_presences() {
        let config = CacheConfig::default();
        assert!(config.wants(ResourceType::GUILD | ResourceType::MEMBER));
        assert!(!config.wants(ResourceType::MESSAGE));
        assert!(!config.wants(ResourceType::PRESENCE));
    }

    #[test]
    fn test_from_client() {
        let client = ClientConfig::builder("T")
            .intents(Intents::GUILDS | Intents::GUILD_PRESENCES)
            .max_messages_per_channel(50)
            .track_voice_states(false)
            .build()
            .unwrap();
        let config = CacheConfig::from_client(&client);

        assert!(config.wants(ResourceType::PRESENCE));
        assert!(config.wants(ResourceType::MESSAGE));
        assert!(!config.wants(ResourceType::VOICE_STATE));
        assert_eq!(config.max_messages_per_channel, 50);
    }

    #[test]
    fn test_max_messages_toggles_resource() {
        let config = CacheConfig::default().max_messages_per_channel(10);
        assert!(config.wants(ResourceType::MESSAGE));
        assert!(!config.max_messages_per_channel(0).wants(ResourceType::MESSAGE));
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(ResourceType::VOICE_STATE.name(), "voice_states");
        assert_eq!((ResourceType::GUILD | ResourceType::ROLE).name(), "resources");
    }
}
