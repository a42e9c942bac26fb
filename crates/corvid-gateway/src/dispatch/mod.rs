//! Event dispatch: cache application and handler fan-out

pub(crate) mod context;
mod dispatcher;
mod registry;

pub use context::Context;
pub(crate) use context::Shared;
pub use dispatcher::Dispatcher;
pub use registry::{HandlerRegistry, HandlerToken};
