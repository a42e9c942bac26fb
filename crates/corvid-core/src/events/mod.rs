//! Gateway events - kinds, payloads, and the typed event enum

mod event;
mod kind;
mod payloads;

pub use event::{Event, EventPayload};
pub use kind::EventKind;
pub use payloads::*;
