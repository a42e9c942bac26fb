//! Message components - tagged by an integer `type`
//!
//! Decoding peeks at the tag and then decodes the concrete variant. Tags this
//! release does not know are kept verbatim in `Component::Unknown`.

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::Emoji;

/// Component type tags
pub mod kind {
    pub const ACTION_ROW: u8 = 1;
    pub const BUTTON: u8 = 2;
    pub const STRING_SELECT: u8 = 3;
    pub const TEXT_INPUT: u8 = 4;
    pub const USER_SELECT: u8 = 5;
    pub const ROLE_SELECT: u8 = 6;
    pub const MENTIONABLE_SELECT: u8 = 7;
    pub const CHANNEL_SELECT: u8 = 8;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    ActionRow(ActionRow),
    Button(Button),
    /// Select menus share a shape; the tag distinguishes what they select
    SelectMenu { kind: u8, menu: SelectMenu },
    TextInput(TextInput),
    Unknown(Value),
}

impl Component {
    /// Integer tag for this component
    pub fn kind(&self) -> u8 {
        match self {
            Self::ActionRow(_) => kind::ACTION_ROW,
            Self::Button(_) => kind::BUTTON,
            Self::SelectMenu { kind, .. } => *kind,
            Self::TextInput(_) => kind::TEXT_INPUT,
            Self::Unknown(value) => value
                .get("type")
                .and_then(Value::as_u64)
                .and_then(|t| u8::try_from(t).ok())
                .unwrap_or(0),
        }
    }

    /// Custom ID for interactive components
    pub fn custom_id(&self) -> Option<&str> {
        match self {
            Self::Button(b) => b.custom_id.as_deref(),
            Self::SelectMenu { menu, .. } => Some(&menu.custom_id),
            Self::TextInput(t) => Some(&t.custom_id),
            Self::ActionRow(_) | Self::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRow {
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub style: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    /// Link buttons carry a URL instead of a custom ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectMenu {
    pub custom_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u8>,
    #[serde(default)]
    pub disabled: bool,
    /// Submitted values, present on modal and component interactions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInput {
    pub custom_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let tag = value
            .get("type")
            .and_then(Value::as_u64)
            .ok_or_else(|| <D::Error as de::Error>::missing_field("type"))?;

        let invalid = <D::Error as de::Error>::custom::<serde_json::Error>;
        let component = match u8::try_from(tag) {
            Ok(kind::ACTION_ROW) => Self::ActionRow(ActionRow::deserialize(value).map_err(invalid)?),
            Ok(kind::BUTTON) => Self::Button(Button::deserialize(value).map_err(invalid)?),
            Ok(kind::TEXT_INPUT) => Self::TextInput(TextInput::deserialize(value).map_err(invalid)?),
            Ok(
                k @ (kind::STRING_SELECT
                | kind::USER_SELECT
                | kind::ROLE_SELECT
                | kind::MENTIONABLE_SELECT
                | kind::CHANNEL_SELECT),
            ) => Self::SelectMenu {
                kind: k,
                menu: SelectMenu::deserialize(value).map_err(invalid)?,
            },
            _ => Self::Unknown(value),
        };
        Ok(component)
    }
}

impl Serialize for Component {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut value = match self {
            Self::ActionRow(row) => serde_json::to_value(row),
            Self::Button(button) => serde_json::to_value(button),
            Self::SelectMenu { menu, .. } => serde_json::to_value(menu),
            Self::TextInput(input) => serde_json::to_value(input),
            Self::Unknown(raw) => return raw.serialize(serializer),
        }
        .map_err(<S::Error as ser::Error>::custom)?;

        if let Value::Object(map) = &mut value {
            map.insert("type".to_string(), Value::from(self.kind()));
        }
        value.serialize(serializer)
    }
}
