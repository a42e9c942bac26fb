//! Gateway close codes

use serde::{Deserialize, Serialize};

/// Close codes the gateway uses when it ends a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    /// Sent a payload before identifying
    NotAuthenticated = 4003,
    /// Invalid token
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    /// Resume with an invalid sequence
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl CloseCode {
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4000 => Some(Self::UnknownError),
            4001 => Some(Self::UnknownOpcode),
            4002 => Some(Self::DecodeError),
            4003 => Some(Self::NotAuthenticated),
            4004 => Some(Self::AuthenticationFailed),
            4005 => Some(Self::AlreadyAuthenticated),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimedOut),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidApiVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Reconnecting with the same configuration cannot succeed
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }

    /// Fatal even when the consumer asked to reconnect on errors
    #[must_use]
    pub const fn is_authentication(self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }

    /// The session can be resumed after this close; otherwise identify afresh
    #[must_use]
    pub const fn can_resume(self) -> bool {
        !matches!(self, Self::InvalidSequence | Self::SessionTimedOut) && !self.is_fatal()
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode sent",
            Self::DecodeError => "Invalid payload sent",
            Self::NotAuthenticated => "Payload sent before identifying",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Identified more than once",
            Self::InvalidSequence => "Invalid resume sequence",
            Self::RateLimited => "Sending payloads too quickly",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}
