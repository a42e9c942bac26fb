use corvid_cache::shard_for_guild;
use corvid_core::Snowflake;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of one shard in a partitioned session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    pub index: u32,
    pub count: u32,
}

impl ShardId {
    pub const ONLY: Self = Self { index: 0, count: 1 };

    /// A count of zero is treated as one
    #[must_use]
    pub fn new(index: u32, count: u32) -> Self {
        Self {
            index,
            count: count.max(1),
        }
    }

    /// Shard that owns `guild_id` when the session runs `count` shards
    #[must_use]
    pub fn for_guild(guild_id: Snowflake, count: u32) -> Self {
        Self::new(shard_for_guild(guild_id, count), count)
    }

    pub fn owns(self, guild_id: Snowflake) -> bool {
        shard_for_guild(guild_id, self.count) == self.index
    }

    /// `[index, count]` as sent in IDENTIFY
    pub fn as_array(self) -> [u32; 2] {
        [self.index, self.count]
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}
