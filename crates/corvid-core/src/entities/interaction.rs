//! Interactions - slash commands, component clicks, and modal submits
//!
//! The interaction `type` decides the shape of `data`, so decoding goes
//! through [`RawInteraction`] and picks the concrete variant afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Channel, Component, FileUpload, Member, Message, User};
use crate::value_objects::{Permissions, Snowflake};

/// Interaction type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum InteractionType {
    Ping,
    ApplicationCommand,
    MessageComponent,
    ApplicationCommandAutocomplete,
    ModalSubmit,
    Unknown(u8),
}

impl From<u8> for InteractionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::ApplicationCommandAutocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

impl From<InteractionType> for u8 {
    fn from(kind: InteractionType) -> Self {
        match kind {
            InteractionType::Ping => 1,
            InteractionType::ApplicationCommand => 2,
            InteractionType::MessageComponent => 3,
            InteractionType::ApplicationCommandAutocomplete => 4,
            InteractionType::ModalSubmit => 5,
            InteractionType::Unknown(v) => v,
        }
    }
}

/// Option value supplied to a slash command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Nested options for subcommands and groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
    #[serde(default)]
    pub focused: bool,
}

/// Data for APPLICATION_COMMAND and APPLICATION_COMMAND_AUTOCOMPLETE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    pub id: Snowflake,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
    /// Users, members, roles, and channels referenced by options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Snowflake>,
}

impl CommandData {
    /// Look up a top-level option by name
    pub fn option(&self, name: &str) -> Option<&CommandOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// Data for MESSAGE_COMPONENT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentData {
    pub custom_id: String,
    pub component_type: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Data for MODAL_SUBMIT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalSubmitData {
    pub custom_id: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// Interaction data, chosen by the interaction type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InteractionData {
    Command(CommandData),
    Component(ComponentData),
    ModalSubmit(ModalSubmitData),
    Unknown(Value),
}

/// Interaction as sent by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInteraction")]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
    /// Present for guild invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    /// Present for DM invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub token: String,
    #[serde(default)]
    pub version: u8,
    /// Message the component was attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_permissions: Option<Permissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Wire shape before `data` is resolved against `type`
#[derive(Debug, Deserialize)]
pub struct RawInteraction {
    id: Snowflake,
    application_id: Snowflake,
    #[serde(rename = "type")]
    kind: InteractionType,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    channel: Option<Channel>,
    #[serde(default)]
    channel_id: Option<Snowflake>,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    user: Option<User>,
    token: String,
    #[serde(default)]
    version: u8,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    app_permissions: Option<Permissions>,
    #[serde(default)]
    locale: Option<String>,
}

impl TryFrom<RawInteraction> for Interaction {
    type Error = serde_json::Error;

    fn try_from(raw: RawInteraction) -> Result<Self, Self::Error> {
        let data = match (raw.kind, raw.data) {
            (_, None) => None,
            (
                InteractionType::ApplicationCommand | InteractionType::ApplicationCommandAutocomplete,
                Some(value),
            ) => Some(InteractionData::Command(serde_json::from_value(value)?)),
            (InteractionType::MessageComponent, Some(value)) => {
                Some(InteractionData::Component(serde_json::from_value(value)?))
            }
            (InteractionType::ModalSubmit, Some(value)) => {
                Some(InteractionData::ModalSubmit(serde_json::from_value(value)?))
            }
            (InteractionType::Ping | InteractionType::Unknown(_), Some(value)) => {
                Some(InteractionData::Unknown(value))
            }
        };

        Ok(Self {
            id: raw.id,
            application_id: raw.application_id,
            kind: raw.kind,
            data,
            guild_id: raw.guild_id,
            channel: raw.channel,
            channel_id: raw.channel_id,
            member: raw.member,
            user: raw.user,
            token: raw.token,
            version: raw.version,
            message: raw.message,
            app_permissions: raw.app_permissions,
            locale: raw.locale,
        })
    }
}

impl Interaction {
    #[inline]
    pub fn is_ping(&self) -> bool {
        self.kind == InteractionType::Ping
    }

    /// The invoking user, from `member.user` in guilds or `user` in DMs
    pub fn author(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    pub fn command(&self) -> Option<&CommandData> {
        match &self.data {
            Some(InteractionData::Command(data)) => Some(data),
            _ => None,
        }
    }
}

/// Interaction callback type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum InteractionResponseType {
    Pong,
    ChannelMessageWithSource,
    DeferredChannelMessageWithSource,
    DeferredUpdateMessage,
    UpdateMessage,
    ApplicationCommandAutocompleteResult,
    Modal,
    Unknown(u8),
}

impl From<u8> for InteractionResponseType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Pong,
            4 => Self::ChannelMessageWithSource,
            5 => Self::DeferredChannelMessageWithSource,
            6 => Self::DeferredUpdateMessage,
            7 => Self::UpdateMessage,
            8 => Self::ApplicationCommandAutocompleteResult,
            9 => Self::Modal,
            other => Self::Unknown(other),
        }
    }
}

impl From<InteractionResponseType> for u8 {
    fn from(kind: InteractionResponseType) -> Self {
        match kind {
            InteractionResponseType::Pong => 1,
            InteractionResponseType::ChannelMessageWithSource => 4,
            InteractionResponseType::DeferredChannelMessageWithSource => 5,
            InteractionResponseType::DeferredUpdateMessage => 6,
            InteractionResponseType::UpdateMessage => 7,
            InteractionResponseType::ApplicationCommandAutocompleteResult => 8,
            InteractionResponseType::Modal => 9,
            InteractionResponseType::Unknown(v) => v,
        }
    }
}

/// Message or modal content of a callback
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionCallbackData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    /// 64 = ephemeral
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    /// Modal only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    /// Modal only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Autocomplete only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
    /// Metadata for uploaded files; filled in when files are attached
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
}

/// Response to an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: InteractionResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
    /// Sent as multipart parts alongside `payload_json`
    #[serde(skip)]
    pub files: Vec<FileUpload>,
}

impl InteractionResponse {
    pub const EPHEMERAL: u64 = 1 << 6;

    #[must_use]
    pub fn pong() -> Self {
        Self {
            kind: InteractionResponseType::Pong,
            data: None,
            files: Vec::new(),
        }
    }

    /// Reply with a message in the invoking channel
    #[must_use]
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(InteractionCallbackData {
                content: Some(content.into()),
                ..InteractionCallbackData::default()
            }),
            files: Vec::new(),
        }
    }

    /// Acknowledge now, follow up later
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            kind: InteractionResponseType::DeferredChannelMessageWithSource,
            data: None,
            files: Vec::new(),
        }
    }

    #[must_use]
    pub fn ephemeral(mut self) -> Self {
        let data = self.data.get_or_insert_with(InteractionCallbackData::default);
        data.flags = Some(data.flags.unwrap_or(0) | Self::EPHEMERAL);
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }

    #[inline]
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// JSON body with attachment metadata for each file part
    pub fn payload_json(&self) -> Result<Value, serde_json::Error> {
        let mut response = self.clone();
        if response.has_files() {
            let data = response
                .data
                .get_or_insert_with(InteractionCallbackData::default);
            data.attachments = response
                .files
                .iter()
                .enumerate()
                .map(|(i, f)| serde_json::json!({ "id": i, "filename": f.filename }))
                .collect();
        }
        serde_json::to_value(&response)
    }
}
