//! # corvid-gateway
//!
//! Gateway sessions: one WebSocket connection per shard with heartbeating,
//! resume and reconnect, a cache-first event dispatcher, and the [`Session`]
//! facade tying them to the REST client and the interaction ingress.
//!
//! ```no_run
//! use corvid_gateway::{ClientConfig, Context, CreateMessage, Session};
//! use corvid_gateway::events::MessageCreate;
//!
//! # async fn run() -> corvid_gateway::Result<()> {
//! let session = Session::new(ClientConfig::from_env()?)?;
//! session.on(|ctx: Context, event: MessageCreate| async move {
//!     if event.message.content == "!ping" {
//!         let _ = ctx
//!             .http()
//!             .create_message(event.message.channel_id, CreateMessage::content("pong"))
//!             .await;
//!     }
//! });
//! session.start().await
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;
pub mod shard;

pub use dispatch::{Context, Dispatcher, HandlerRegistry, HandlerToken};
pub use error::{Error, GatewayError, Result};
pub use protocol::{
    CloseCode, GatewayFrame, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    VoiceStateUpdatePayload,
};
pub use session::Session;
pub use shard::{SessionState, Shard, ShardId};

// Re-exports so applications depend on one crate
pub use corvid_common::{ClientConfig, ConfigError};
pub use corvid_core::events;
pub use corvid_http::{CreateMessage, HttpClient, HttpError};
pub use corvid_core::{Event, EventKind, Intents, InteractionResponse, Snowflake, Status};
