//! Gateway wire protocol: op codes, close codes, frames, payloads, and the
//! zlib-stream transport

mod close_codes;
mod frame;
mod inflater;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use frame::GatewayFrame;
pub use inflater::{InflateError, Inflater};
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload, VoiceStateUpdatePayload,
};
