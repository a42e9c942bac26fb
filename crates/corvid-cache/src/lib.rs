//! # corvid-cache
//!
//! In-memory view of the entities seen on the gateway. The session applies
//! every dispatch here before handlers run, so update and delete events reach
//! handlers with their prior state attached.

mod cache;
pub mod config;
pub mod ring;
mod state;
pub mod stats;
pub mod update;

pub use cache::{shard_for_guild, InMemoryCache};
pub use config::{CacheConfig, ResourceType};
pub use ring::MessageRing;
pub use stats::CacheStats;
pub use update::UpdateCache;
