//! Gateway frame format
//!
//! Every message in either direction is `{op, d, s, t}`; `s` and `t` are only
//! set on dispatches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload, VoiceStateUpdatePayload,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: OpCode,

    #[serde(default)]
    pub d: Value,

    /// Dispatch sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Dispatch event name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    fn new(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    fn command<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(op, serde_json::to_value(payload)?))
    }

    // === Sent by the client ===

    /// op 1 carrying the last sequence seen
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Self::command(OpCode::Identify, payload)
    }

    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Self::command(OpCode::Resume, payload)
    }

    pub fn presence_update(payload: &PresenceUpdatePayload) -> Result<Self, serde_json::Error> {
        Self::command(OpCode::PresenceUpdate, payload)
    }

    pub fn voice_state_update(payload: &VoiceStateUpdatePayload) -> Result<Self, serde_json::Error> {
        Self::command(OpCode::VoiceStateUpdate, payload)
    }

    pub fn request_guild_members(
        payload: &RequestGuildMembersPayload,
    ) -> Result<Self, serde_json::Error> {
        Self::command(OpCode::RequestGuildMembers, payload)
    }

    // === Sent by the gateway ===

    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::new(
            OpCode::Hello,
            serde_json::json!({ "heartbeat_interval": heartbeat_interval }),
        )
    }

    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event.into()),
        }
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::new(OpCode::HeartbeatAck, Value::Null)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::new(OpCode::Reconnect, Value::Null)
    }

    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::new(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// The `d` flag of INVALID_SESSION; anything but `true` means not resumable
    pub fn is_resumable(&self) -> bool {
        self.op == OpCode::InvalidSession && self.d.as_bool() == Some(true)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.s) {
            (Some(t), Some(s)) => write!(f, "{} {t} #{s}", self.op),
            _ => write!(f, "{}", self.op),
        }
    }
}
