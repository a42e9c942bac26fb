//! Consumer-facing handle to a running shard

use corvid_core::Snowflake;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ResumeInfo, SessionState, ShardId};
use crate::error::GatewayError;
use crate::protocol::{
    GatewayFrame, PresenceUpdatePayload, RequestGuildMembersPayload, VoiceStateUpdatePayload,
};

const NONCE_LEN: usize = 16;

/// State shared between a shard's runner and its handles
#[derive(Debug, Default)]
pub struct ShardStatus {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) latency: Mutex<Option<Duration>>,
    pub(crate) resume: Mutex<ResumeInfo>,
}

impl ShardStatus {
    pub(crate) fn sequence(&self) -> Option<u64> {
        self.resume.lock().sequence
    }
}

/// Cheap, cloneable handle for sending commands on one shard
#[derive(Debug, Clone)]
pub struct Shard {
    id: ShardId,
    commands: mpsc::UnboundedSender<GatewayFrame>,
    status: Arc<ShardStatus>,
}

impl Shard {
    pub(crate) fn new(
        id: ShardId,
        commands: mpsc::UnboundedSender<GatewayFrame>,
        status: Arc<ShardStatus>,
    ) -> Self {
        Self {
            id,
            commands,
            status,
        }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.status.state.lock()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        *self.status.latency.lock()
    }

    pub fn session_id(&self) -> Option<String> {
        self.status.resume.lock().session_id.clone()
    }

    /// Last dispatch sequence received
    pub fn sequence(&self) -> Option<u64> {
        self.status.sequence()
    }

    /// Queue a gateway command
    ///
    /// Only presence, voice state and member requests are accepted; the queue
    /// drains after READY or RESUMED at up to 120 commands per minute.
    pub fn send(&self, frame: GatewayFrame) -> Result<(), GatewayError> {
        if !frame.op.is_rate_limited_command() {
            return Err(GatewayError::Protocol(format!(
                "{} cannot be sent as a command",
                frame.op
            )));
        }
        self.commands.send(frame).map_err(|_| GatewayError::Closed)
    }

    pub fn update_presence(&self, presence: &PresenceUpdatePayload) -> Result<(), GatewayError> {
        self.send(GatewayFrame::presence_update(presence)?)
    }

    pub fn update_voice_state(
        &self,
        voice_state: &VoiceStateUpdatePayload,
    ) -> Result<(), GatewayError> {
        self.send(GatewayFrame::voice_state_update(voice_state)?)
    }

    /// Request members of a guild; the returned nonce tags the resulting chunks
    pub fn request_guild_members(
        &self,
        mut request: RequestGuildMembersPayload,
    ) -> Result<String, GatewayError> {
        let nonce = match &request.nonce {
            Some(nonce) => nonce.clone(),
            None => {
                let nonce = generate_nonce();
                request.nonce = Some(nonce.clone());
                nonce
            }
        };
        self.send(GatewayFrame::request_guild_members(&request)?)?;
        Ok(nonce)
    }

    /// Whether this shard receives events for `guild_id`
    pub fn owns(&self, guild_id: Snowflake) -> bool {
        self.id.owns(guild_id)
    }
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;
    use corvid_core::Status;

    fn shard() -> (Shard, mpsc::UnboundedReceiver<GatewayFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shard = Shard::new(ShardId::new(0, 2), tx, Arc::new(ShardStatus::default()));
        (shard, rx)
    }

    #[test]
    fn test_send_rejects_handshake_ops() {
        let (shard, _rx) = shard();
        let err = shard.send(GatewayFrame::heartbeat(None)).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }

    #[test]
    fn test_update_presence_queues_frame() {
        let (shard, mut rx) = shard();
        shard
            .update_presence(&PresenceUpdatePayload::new(Status::Dnd))
            .unwrap();
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.op, OpCode::PresenceUpdate);
        assert_eq!(frame.d["status"], "dnd");
    }

    #[test]
    fn test_request_guild_members_generates_nonce() {
        let (shard, mut rx) = shard();
        let nonce = shard
            .request_guild_members(RequestGuildMembersPayload::all(Snowflake::new(4)))
            .unwrap();
        assert_eq!(nonce.len(), NONCE_LEN);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.d["nonce"], nonce.as_str());

        let nonce = shard
            .request_guild_members(
                RequestGuildMembersPayload::all(Snowflake::new(4)).with_nonce("mine"),
            )
            .unwrap();
        assert_eq!(nonce, "mine");
    }

    #[test]
    fn test_send_after_runner_stopped() {
        let (shard, rx) = shard();
        drop(rx);
        let err = shard
            .update_voice_state(&VoiceStateUpdatePayload::leave(Snowflake::new(1)))
            .unwrap_err();
        assert!(matches!(err, GatewayError::Closed));
    }

    #[test]
    fn test_status_reflects_runner() {
        let (shard, _rx) = shard();
        assert_eq!(shard.state(), SessionState::New);
        shard.status.resume.lock().start("S".into(), None);
        shard.status.resume.lock().observe(9);
        assert_eq!(shard.session_id().as_deref(), Some("S"));
        assert_eq!(shard.sequence(), Some(9));
    }
}
