//! The closed set of typed events
//!
//! Dispatch frames are decoded by name into one variant; names without a type
//! become [`Event::Unknown`] and reach only catch-all handlers.

use serde_json::Value;

use super::kind::EventKind;
use super::payloads::*;
use crate::error::ModelError;
use crate::value_objects::Snowflake;

/// Payload types that handlers can subscribe to by static type
pub trait EventPayload: Clone + Send + Sync + 'static {
    const KIND: EventKind;

    /// Borrow the payload if `event` is of this type
    fn from_event(event: &Event) -> Option<&Self>;
}

macro_rules! events {
    ($($variant:ident($payload:ty)),+ $(,)?) => {
        /// Typed event
        #[derive(Debug, Clone)]
        pub enum Event {
            $($variant($payload),)+
        }

        impl Event {
            /// Registry key for this event
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Self::$variant(_) => EventKind::$variant,)+
                }
            }
        }

        $(
            impl EventPayload for $payload {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$payload> for Event {
                fn from(payload: $payload) -> Self {
                    Self::$variant(payload)
                }
            }
        )+
    };
}

events! {
    Ready(Ready),
    Resumed(Resumed),
    GuildCreate(GuildCreate),
    GuildUpdate(GuildUpdate),
    GuildDelete(GuildDelete),
    GuildRoleCreate(GuildRoleCreate),
    GuildRoleUpdate(GuildRoleUpdate),
    GuildRoleDelete(GuildRoleDelete),
    GuildEmojisUpdate(GuildEmojisUpdate),
    GuildMemberAdd(GuildMemberAdd),
    GuildMemberUpdate(GuildMemberUpdate),
    GuildMemberRemove(GuildMemberRemove),
    GuildMembersChunk(GuildMembersChunk),
    ChannelCreate(ChannelCreate),
    ChannelUpdate(ChannelUpdate),
    ChannelDelete(ChannelDelete),
    ThreadCreate(ThreadCreate),
    ThreadUpdate(ThreadUpdate),
    ThreadDelete(ThreadDelete),
    MessageCreate(MessageCreate),
    MessageUpdate(MessageUpdate),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),
    MessageReactionAdd(MessageReactionAdd),
    MessageReactionRemove(MessageReactionRemove),
    TypingStart(TypingStart),
    PresenceUpdate(PresenceUpdate),
    VoiceStateUpdate(VoiceStateUpdate),
    VoiceServerUpdate(VoiceServerUpdate),
    UserUpdate(UserUpdate),
    InteractionCreate(InteractionCreate),
    Connect(Connect),
    Disconnect(Disconnect),
    RateLimit(RateLimit),
    Unknown(UnknownEvent),
}

impl Event {
    /// Decode a dispatch frame's `t` and `d` into a typed event
    pub fn decode(name: &str, data: Value) -> Result<Self, ModelError> {
        let Some(kind) = EventKind::from_dispatch(name) else {
            return Ok(Self::Unknown(UnknownEvent {
                name: name.to_string(),
                data,
            }));
        };

        let decode_err = |source| ModelError::Decode { kind, source };
        let event = match kind {
            EventKind::Ready => Self::Ready(serde_json::from_value(data).map_err(decode_err)?),
            // RESUMED carries only debug traces, or null
            EventKind::Resumed => Self::Resumed(Resumed::default()),
            EventKind::GuildCreate => {
                Self::GuildCreate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildUpdate => {
                Self::GuildUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildDelete => {
                Self::GuildDelete(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildRoleCreate => {
                Self::GuildRoleCreate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildRoleUpdate => {
                Self::GuildRoleUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildRoleDelete => {
                Self::GuildRoleDelete(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildEmojisUpdate => {
                Self::GuildEmojisUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildMemberAdd => {
                Self::GuildMemberAdd(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildMemberUpdate => {
                Self::GuildMemberUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildMemberRemove => {
                Self::GuildMemberRemove(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::GuildMembersChunk => {
                Self::GuildMembersChunk(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::ChannelCreate => {
                Self::ChannelCreate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::ChannelUpdate => {
                Self::ChannelUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::ChannelDelete => {
                Self::ChannelDelete(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::ThreadCreate => {
                Self::ThreadCreate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::ThreadUpdate => {
                Self::ThreadUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::ThreadDelete => {
                Self::ThreadDelete(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::MessageCreate => {
                Self::MessageCreate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::MessageUpdate => {
                Self::MessageUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::MessageDelete => {
                Self::MessageDelete(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::MessageDeleteBulk => {
                Self::MessageDeleteBulk(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::MessageReactionAdd => {
                Self::MessageReactionAdd(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::MessageReactionRemove => {
                Self::MessageReactionRemove(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::TypingStart => {
                Self::TypingStart(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::PresenceUpdate => {
                Self::PresenceUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::VoiceStateUpdate => {
                Self::VoiceStateUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::VoiceServerUpdate => {
                Self::VoiceServerUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::UserUpdate => {
                Self::UserUpdate(serde_json::from_value(data).map_err(decode_err)?)
            }
            EventKind::InteractionCreate => Self::InteractionCreate(InteractionCreate::new(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            EventKind::Connect | EventKind::Disconnect | EventKind::RateLimit | EventKind::Unknown => {
                return Err(ModelError::NotDispatchable(kind));
            }
        };
        Ok(event)
    }

    /// Guild the event belongs to, used to check shard placement
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::GuildCreate(e) => Some(e.guild.id),
            Self::GuildUpdate(e) => Some(e.guild.id),
            Self::GuildDelete(e) => Some(e.id),
            Self::GuildRoleCreate(e) => Some(e.guild_id),
            Self::GuildRoleUpdate(e) => Some(e.guild_id),
            Self::GuildRoleDelete(e) => Some(e.guild_id),
            Self::GuildEmojisUpdate(e) => Some(e.guild_id),
            Self::GuildMemberAdd(e) => Some(e.guild_id),
            Self::GuildMemberUpdate(e) => Some(e.guild_id),
            Self::GuildMemberRemove(e) => Some(e.guild_id),
            Self::GuildMembersChunk(e) => Some(e.guild_id),
            Self::ChannelCreate(e) => e.channel.guild_id,
            Self::ChannelUpdate(e) => e.channel.guild_id,
            Self::ChannelDelete(e) => e.channel.guild_id,
            Self::ThreadCreate(e) => e.thread.guild_id,
            Self::ThreadUpdate(e) => e.thread.guild_id,
            Self::ThreadDelete(e) => Some(e.guild_id),
            Self::MessageCreate(e) => e.message.guild_id,
            Self::MessageUpdate(e) => e.update.guild_id,
            Self::MessageDelete(e) => e.guild_id,
            Self::MessageDeleteBulk(e) => e.guild_id,
            Self::MessageReactionAdd(e) => e.guild_id,
            Self::MessageReactionRemove(e) => e.guild_id,
            Self::TypingStart(e) => e.guild_id,
            Self::PresenceUpdate(e) => e.presence.guild_id,
            Self::VoiceStateUpdate(e) => e.state.guild_id,
            Self::VoiceServerUpdate(e) => Some(e.guild_id),
            Self::InteractionCreate(e) => e.interaction.guild_id,
            Self::Ready(_)
            | Self::Resumed(_)
            | Self::UserUpdate(_)
            | Self::Connect(_)
            | Self::Disconnect(_)
            | Self::RateLimit(_)
            | Self::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_known_event() {
        let event = Event::decode(
            "MESSAGE_CREATE",
            json!({
                "id": "500", "channel_id": "10", "guild_id": "1",
                "author": {"id": "5", "username": "raven"},
                "content": "caw", "timestamp": "2024-01-01T00:00:00+00:00"
            }),
        )
        .unwrap();

        assert_eq!(event.kind(), EventKind::MessageCreate);
        assert_eq!(event.guild_id(), Some(Snowflake::new(1)));
        let payload = MessageCreate::from_event(&event).unwrap();
        assert_eq!(payload.message.content, "caw");
        assert!(Ready::from_event(&event).is_none());
    }

    #[test]
    fn test_decode_unknown_event() {
        let event = Event::decode("STAGE_INSTANCE_CREATE", json!({"id": "1"})).unwrap();
        let Event::Unknown(unknown) = &event else {
            panic!("expected unknown event");
        };
        assert_eq!(unknown.name, "STAGE_INSTANCE_CREATE");
        assert_eq!(event.kind(), EventKind::Unknown);
    }

    #[test]
    fn test_decode_resumed_with_null_body() {
        let event = Event::decode("RESUMED", Value::Null).unwrap();
        assert_eq!(event.kind(), EventKind::Resumed);
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = Event::decode("GUILD_ROLE_CREATE", json!({"guild_id": "1"})).unwrap_err();
        assert!(matches!(err, ModelError::Decode { kind: EventKind::GuildRoleCreate, .. }));
    }

    #[test]
    fn test_synthetic_names_do_not_decode_from_wire() {
        let event = Event::decode("RATE_LIMIT", json!({})).unwrap();
        assert_eq!(event.kind(), EventKind::Unknown);
    }

    #[test]
    fn test_payload_kind_constants() {
        assert_eq!(<GuildCreate as EventPayload>::KIND, EventKind::GuildCreate);
        assert_eq!(<UnknownEvent as EventPayload>::KIND, EventKind::Unknown);

        let event: Event = Connect {
            shard_id: 0,
            resumed: false,
        }
        .into();
        assert_eq!(event.kind(), EventKind::Connect);
    }
}
