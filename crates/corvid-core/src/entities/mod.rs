//! Platform entities
//!
//! Entities hold IDs rather than back-references; related objects are looked
//! up through the cache.

mod channel;
mod component;
mod guild;
mod interaction;
mod member;
mod message;
mod presence;
mod role;
mod user;

pub use channel::{Channel, ChannelType, PermissionOverwrite, ThreadMetadata};
pub use component::{kind as component_kind, ActionRow, Button, Component, SelectMenu, SelectOption, TextInput};
pub use guild::{Guild, UnavailableGuild};
pub use interaction::{
    CommandData, CommandOption, ComponentData, Interaction, InteractionCallbackData,
    InteractionData, InteractionResponse, InteractionResponseType, InteractionType,
    ModalSubmitData, RawInteraction,
};
pub use member::Member;
pub use message::{Attachment, FileUpload, Message, PartialMessage};
pub use presence::{Activity, Presence, PresenceUser, Status, VoiceState};
pub use role::{Emoji, Role};
pub use user::User;
