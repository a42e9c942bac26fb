//! User entity - an account as seen by the client

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    /// Legacy four-digit tag; "0" for migrated accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub system: bool,
}

impl User {
    /// Create a user with only the required fields
    #[must_use]
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            discriminator: None,
            global_name: None,
            avatar: None,
            bot: false,
            system: false,
        }
    }

    /// Get display name (global name if set, otherwise username)
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Get the legacy `name#0000` tag, or the bare username for migrated accounts
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{d}", self.username),
            _ => self.username.clone(),
        }
    }

    /// Mention string usable in message content
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}
