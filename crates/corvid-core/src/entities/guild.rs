//! Guild entity - a server and everything it owns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Channel, Emoji, Member, Presence, Role, VoiceState};
use crate::value_objects::{Permissions, Snowflake};

/// Guild as delivered by GUILD_CREATE
///
/// GUILD_UPDATE carries the same scalar fields with the collections empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afk_channel_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_channel_id: Option<Snowflake>,
    #[serde(default)]
    pub verification_level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub large: bool,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub threads: Vec<Channel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emojis: Vec<Emoji>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voice_states: Vec<VoiceState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presences: Vec<Presence>,
}

impl Guild {
    /// Create a guild with only scalar fields populated
    #[must_use]
    pub fn new(id: Snowflake, name: impl Into<String>, owner_id: Snowflake) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            description: None,
            owner_id,
            afk_channel_id: None,
            system_channel_id: None,
            verification_level: 0,
            preferred_locale: None,
            permissions: None,
            features: Vec::new(),
            joined_at: None,
            large: false,
            unavailable: false,
            member_count: None,
            channels: Vec::new(),
            threads: Vec::new(),
            roles: Vec::new(),
            emojis: Vec::new(),
            members: Vec::new(),
            voice_states: Vec::new(),
            presences: Vec::new(),
        }
    }

    /// Check if user is the guild owner
    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == user_id
    }

    /// Copy scalar fields from an update, leaving owned collections alone
    pub fn merge_scalars(&mut self, update: &Guild) {
        self.name.clone_from(&update.name);
        self.icon.clone_from(&update.icon);
        self.description.clone_from(&update.description);
        self.owner_id = update.owner_id;
        self.afk_channel_id = update.afk_channel_id;
        self.system_channel_id = update.system_channel_id;
        self.verification_level = update.verification_level;
        self.preferred_locale.clone_from(&update.preferred_locale);
        if update.permissions.is_some() {
            self.permissions = update.permissions;
        }
        self.features.clone_from(&update.features);
        if update.member_count.is_some() {
            self.member_count = update.member_count;
        }
        self.unavailable = false;
    }
}

/// Guild stub sent in READY and during outages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

impl UnavailableGuild {
    #[must_use]
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
        }
    }
}
