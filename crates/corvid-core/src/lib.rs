//! # corvid-core
//!
//! Platform model: snowflakes, bitmasks, entities, interactions, and the typed
//! gateway events. Nothing here performs I/O.

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Activity, Attachment, Channel, ChannelType, Component, Emoji, FileUpload, Guild, Interaction,
    InteractionData, InteractionResponse, InteractionType, Member, Message, PartialMessage,
    Presence, Role, Status, UnavailableGuild, User, VoiceState,
};
pub use error::ModelError;
pub use events::{Event, EventKind, EventPayload};
pub use traits::{InteractionResponder, RespondError};
pub use value_objects::{Intents, Permissions, Snowflake, SnowflakeParseError};
