//! Role and emoji entities - guild-owned decorations

use serde::{Deserialize, Serialize};

use crate::value_objects::{Permissions, Snowflake};

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub mentionable: bool,
}

impl Role {
    /// Check if this is the @everyone role (shares the guild's ID)
    #[inline]
    pub fn is_everyone(&self, guild_id: Snowflake) -> bool {
        self.id == guild_id
    }
}

/// Custom or unicode emoji
///
/// Unicode emoji have no ID; custom emoji always do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub require_colons: bool,
}

fn default_true() -> bool {
    true
}

impl Emoji {
    /// Unicode emoji
    #[must_use]
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            roles: Vec::new(),
            animated: false,
            managed: false,
            available: true,
            require_colons: false,
        }
    }

    /// Check if this is a guild custom emoji
    #[inline]
    pub fn is_custom(&self) -> bool {
        self.id.is_some()
    }
}
