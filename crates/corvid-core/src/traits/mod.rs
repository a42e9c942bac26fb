//! Seams implemented by the delivery layers

mod responder;

pub use responder::{InteractionResponder, RespondError};
