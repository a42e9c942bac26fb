//! Message entity - chat messages, attachments, and outbound files

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Component, Member, User};
use crate::value_objects::Snowflake;

/// File attachment on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub proxy_url: String,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    /// Partial member for guild messages; carries no `user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub mention_roles: Vec<Snowflake>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Embeds are passed through untouched
    #[serde(default)]
    pub embeds: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<Snowflake>,
}

impl Message {
    /// Create a plain text message
    #[must_use]
    pub fn new(id: Snowflake, channel_id: Snowflake, author: User, content: impl Into<String>) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author,
            member: None,
            content: content.into(),
            timestamp: id.created_at(),
            edited_timestamp: None,
            tts: false,
            mention_everyone: false,
            mentions: Vec::new(),
            mention_roles: Vec::new(),
            attachments: Vec::new(),
            embeds: Vec::new(),
            components: Vec::new(),
            pinned: false,
            kind: 0,
            webhook_id: None,
        }
    }

    /// Check if the message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    /// Check if the message mentions a user
    pub fn mentions_user(&self, user_id: Snowflake) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
    }

    /// Apply the fields present in a MESSAGE_UPDATE payload
    pub fn apply_update(&mut self, update: &PartialMessage) {
        if let Some(content) = &update.content {
            self.content.clone_from(content);
        }
        if update.edited_timestamp.is_some() {
            self.edited_timestamp = update.edited_timestamp;
        }
        if let Some(embeds) = &update.embeds {
            self.embeds.clone_from(embeds);
        }
        if let Some(attachments) = &update.attachments {
            self.attachments.clone_from(attachments);
        }
        if let Some(components) = &update.components {
            self.components.clone_from(components);
        }
        if let Some(mentions) = &update.mentions {
            self.mentions.clone_from(mentions);
        }
        if let Some(pinned) = update.pinned {
            self.pinned = pinned;
        }
    }
}

/// MESSAGE_UPDATE body; only `id` and `channel_id` are guaranteed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<Vec<User>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl PartialMessage {
    /// Edit that changes nothing yet
    #[must_use]
    pub fn new(id: Snowflake, channel_id: Snowflake) -> Self {
        Self {
            id,
            channel_id,
            guild_id: None,
            author: None,
            content: None,
            edited_timestamp: None,
            mentions: None,
            attachments: None,
            embeds: None,
            components: None,
            pinned: None,
        }
    }
}

/// File to upload with a message or interaction response
///
/// Never serialized into JSON; sent as a `files[n]` multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    /// Defaults to `application/octet-stream` on the wire
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FileUpload {
    #[must_use]
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
