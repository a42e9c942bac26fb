//! Channel entity - guild channels, DMs, and threads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::User;
use crate::value_objects::{Permissions, Snowflake};

/// Channel type
///
/// Types added by the platform after this release decode as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelType {
    #[default]
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildAnnouncement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    GuildStageVoice,
    GuildDirectory,
    GuildForum,
    GuildMedia,
    Unknown(u8),
}

impl ChannelType {
    /// Get the numeric value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::GuildText => 0,
            Self::Dm => 1,
            Self::GuildVoice => 2,
            Self::GroupDm => 3,
            Self::GuildCategory => 4,
            Self::GuildAnnouncement => 5,
            Self::AnnouncementThread => 10,
            Self::PublicThread => 11,
            Self::PrivateThread => 12,
            Self::GuildStageVoice => 13,
            Self::GuildDirectory => 14,
            Self::GuildForum => 15,
            Self::GuildMedia => 16,
            Self::Unknown(v) => v,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_thread(self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }

    /// Private channels exist outside any guild
    #[inline]
    #[must_use]
    pub const fn is_private(self) -> bool {
        matches!(self, Self::Dm | Self::GroupDm)
    }
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::GuildStageVoice,
            14 => Self::GuildDirectory,
            15 => Self::GuildForum,
            16 => Self::GuildMedia,
            other => Self::Unknown(other),
        }
    }
}

impl Serialize for ChannelType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(Self::from)
    }
}

/// Role or member permission overwrite on a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    /// 0 = role, 1 = member
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

/// Thread-only state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub auto_archive_duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locked: bool,
}

/// Channel entity
///
/// Guild channels carry `guild_id`; DMs carry `recipients` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type", default)]
    pub kind: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(default)]
    pub nsfw: bool,
    /// Category for channels, parent channel for threads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_overwrites: Vec<PermissionOverwrite>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_metadata: Option<ThreadMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_user: Option<u32>,
}

impl Channel {
    /// Create a guild text channel
    #[must_use]
    pub fn new_text(id: Snowflake, guild_id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            guild_id: Some(guild_id),
            name: Some(name.into()),
            ..Self::bare(id, ChannelType::GuildText)
        }
    }

    /// Create a DM channel with one recipient
    #[must_use]
    pub fn new_dm(id: Snowflake, recipient: User) -> Self {
        Self {
            recipients: vec![recipient],
            ..Self::bare(id, ChannelType::Dm)
        }
    }

    /// Create a public thread under `parent_id`
    #[must_use]
    pub fn new_thread(
        id: Snowflake,
        guild_id: Snowflake,
        parent_id: Snowflake,
        name: impl Into<String>,
    ) -> Self {
        Self {
            guild_id: Some(guild_id),
            parent_id: Some(parent_id),
            name: Some(name.into()),
            thread_metadata: Some(ThreadMetadata {
                archived: false,
                auto_archive_duration: 1440,
                archive_timestamp: None,
                locked: false,
            }),
            ..Self::bare(id, ChannelType::PublicThread)
        }
    }

    fn bare(id: Snowflake, kind: ChannelType) -> Self {
        Self {
            id,
            kind,
            guild_id: None,
            name: None,
            topic: None,
            position: None,
            nsfw: false,
            parent_id: None,
            last_message_id: None,
            permission_overwrites: Vec::new(),
            recipients: Vec::new(),
            owner_id: None,
            thread_metadata: None,
            rate_limit_per_user: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_thread(&self) -> bool {
        self.kind.is_thread()
    }

    /// DM or group DM, or any channel arriving without a guild
    #[inline]
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.kind.is_private() || self.guild_id.is_none()
    }

    /// Mention string usable in message content
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}
