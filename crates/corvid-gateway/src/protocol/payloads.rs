//! Payloads carried in the `d` field of non-dispatch frames

use corvid_core::{Activity, Intents, Snowflake, Status};
use serde::{Deserialize, Serialize};

/// op 10
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 45_000;

    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self::with_interval(Self::DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// op 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    /// `[shard_index, shard_count]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    /// Per-payload compression; transport compression is negotiated in the URL
    #[serde(default)]
    pub compress: bool,
    pub large_threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,
}

impl IdentifyPayload {
    pub fn new(token: impl Into<String>, intents: Intents, properties: IdentifyProperties) -> Self {
        Self {
            token: token.into(),
            intents,
            properties,
            shard: None,
            compress: false,
            large_threshold: 50,
            presence: None,
        }
    }

    #[must_use]
    pub fn with_shard(mut self, index: u32, count: u32) -> Self {
        self.shard = Some([index, count]);
        self
    }

    #[must_use]
    pub fn with_large_threshold(mut self, threshold: u32) -> Self {
        self.large_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    /// Properties for this host, reporting `client_name` as browser and device
    pub fn new(client_name: &str) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: client_name.to_string(),
            device: client_name.to_string(),
        }
    }
}

/// op 6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

/// op 3, also embedded in IDENTIFY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix milliseconds since the client went idle
    pub since: Option<u64>,
    pub activities: Vec<Activity>,
    pub status: Status,
    pub afk: bool,
}

impl PresenceUpdatePayload {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status,
            afk: false,
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    #[must_use]
    pub fn afk(mut self, since: u64) -> Self {
        self.afk = true;
        self.since = Some(since);
        self
    }
}

/// op 4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdatePayload {
    pub guild_id: Snowflake,
    /// `None` leaves voice
    pub channel_id: Option<Snowflake>,
    pub self_mute: bool,
    pub self_deaf: bool,
}

impl VoiceStateUpdatePayload {
    #[must_use]
    pub fn join(guild_id: Snowflake, channel_id: Snowflake) -> Self {
        Self {
            guild_id,
            channel_id: Some(channel_id),
            self_mute: false,
            self_deaf: false,
        }
    }

    #[must_use]
    pub fn leave(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            channel_id: None,
            self_mute: false,
            self_deaf: false,
        }
    }
}

/// op 8
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    /// Username prefix; empty with `limit = 0` requests everyone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub presences: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<Snowflake>,
    /// Echoed back on every GUILD_MEMBERS_CHUNK of the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl RequestGuildMembersPayload {
    /// Request every member of the guild
    #[must_use]
    pub fn all(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            query: Some(String::new()),
            limit: 0,
            presences: false,
            user_ids: Vec::new(),
            nonce: None,
        }
    }

    #[must_use]
    pub fn users(guild_id: Snowflake, user_ids: Vec<Snowflake>) -> Self {
        Self {
            guild_id,
            query: None,
            limit: 0,
            presences: false,
            user_ids,
            nonce: None,
        }
    }

    #[must_use]
    pub fn with_presences(mut self) -> Self {
        self.presences = true;
        self
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}
