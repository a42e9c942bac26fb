//! Cache statistics

use serde::Serialize;

/// Entity counts at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub guilds: usize,
    pub unavailable_guilds: usize,
    /// Guild channels plus private channels
    pub channels: usize,
    pub threads: usize,
    pub roles: usize,
    pub emojis: usize,
    pub members: usize,
    pub users: usize,
    pub messages: usize,
    pub voice_states: usize,
    pub presences: usize,
}
