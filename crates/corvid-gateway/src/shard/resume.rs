//! What a shard needs to resume its session

use serde::{Deserialize, Serialize};

use crate::protocol::ResumePayload;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeInfo {
    pub session_id: Option<String>,
    /// Highest dispatch sequence seen under `session_id`
    pub sequence: Option<u64>,
    /// Preferred URL for resuming, from READY
    pub resume_url: Option<String>,
}

impl ResumeInfo {
    /// Record a dispatch sequence; returns false for a replayed or stale one
    pub fn observe(&mut self, sequence: u64) -> bool {
        match self.sequence {
            Some(last) if sequence <= last => false,
            _ => {
                self.sequence = Some(sequence);
                true
            }
        }
    }

    /// A fresh session began with READY
    pub fn start(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_url = resume_url;
    }

    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Forget the session; the next handshake identifies
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn resume_payload(&self, token: &str) -> Option<ResumePayload> {
        Some(ResumePayload {
            token: token.to_string(),
            session_id: self.session_id.clone()?,
            seq: self.sequence?,
        })
    }
}
