//! Shards: one gateway connection each, with its lifecycle state, heartbeat,
//! reconnect backoff and rate-limited command queue

mod backoff;
mod command;
mod handle;
mod heartbeat;
mod id;
mod resume;
mod runner;
mod state;

pub use backoff::Backoff;
pub use command::{CommandLimiter, COMMANDS_PER_MINUTE};
pub(crate) use command::CommandQueue;
pub use handle::{Shard, ShardStatus};
pub use heartbeat::{Heartbeat, Tick};
pub use id::ShardId;
pub use resume::ResumeInfo;
pub(crate) use runner::{GatewayUrl, ShardRunner};
pub use state::{SessionState, StateBoard};
