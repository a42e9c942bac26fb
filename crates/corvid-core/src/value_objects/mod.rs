//! Value objects - identifiers and bitmasks shared by every layer

mod intents;
mod permissions;
mod snowflake;

pub use intents::Intents;
pub use permissions::Permissions;
pub use snowflake::{Snowflake, SnowflakeParseError};
