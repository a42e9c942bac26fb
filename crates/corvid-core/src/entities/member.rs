//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::value_objects::Snowflake;

/// Guild member as delivered on the wire
///
/// The embedded `user` is absent on some payloads (message authors, voice
/// states inside GUILD_CREATE); the cache always stores members keyed by
/// user ID and keeps the user separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premium_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_disabled_until: Option<DateTime<Utc>>,
}

impl Member {
    /// Create a member for `user` with no roles
    #[must_use]
    pub fn new(user: User) -> Self {
        Self {
            user: Some(user),
            nick: None,
            avatar: None,
            roles: Vec::new(),
            joined_at: None,
            premium_since: None,
            deaf: false,
            mute: false,
            pending: false,
            communication_disabled_until: None,
        }
    }

    /// ID of the embedded user, if present
    #[inline]
    pub fn user_id(&self) -> Option<Snowflake> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Get display name (nickname if set, otherwise the user's display name)
    pub fn display_name(&self) -> Option<&str> {
        self.nick
            .as_deref()
            .or_else(|| self.user.as_ref().map(User::display_name))
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}
