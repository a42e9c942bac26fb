//! Session lifecycle states
//!
//! Each shard reports its own state; the session state is the aggregate over
//! every shard it runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not connected yet
    #[default]
    New,
    /// Opening the socket or waiting for HELLO
    Connecting,
    /// IDENTIFY or RESUME sent, waiting for READY or RESUMED
    Identified,
    Ready,
    /// Connection lost, waiting to reconnect
    Reconnecting,
    Closed,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Identified => "identified",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Combine per-shard states into one session state
    pub fn aggregate(states: &[Self]) -> Self {
        if states.is_empty() || states.iter().all(|s| *s == Self::New) {
            return Self::New;
        }
        if states.iter().all(|s| *s == Self::Closed) {
            return Self::Closed;
        }
        if states.contains(&Self::Reconnecting) {
            return Self::Reconnecting;
        }
        if states.iter().all(|s| *s == Self::Ready) {
            return Self::Ready;
        }
        if states.iter().any(|s| matches!(s, Self::Identified | Self::Ready)) {
            return Self::Identified;
        }
        Self::Connecting
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-shard states plus the aggregate, published on a watch channel
#[derive(Debug)]
pub struct StateBoard {
    shards: Mutex<Vec<SessionState>>,
    tx: watch::Sender<SessionState>,
}

impl StateBoard {
    pub fn new(shards: usize) -> Self {
        let (tx, _) = watch::channel(SessionState::New);
        Self {
            shards: Mutex::new(vec![SessionState::New; shards]),
            tx,
        }
    }

    /// Record the state of the shard in `slot`
    pub fn set(&self, slot: usize, state: SessionState) {
        let aggregate = {
            let mut shards = self.shards.lock();
            if let Some(entry) = shards.get_mut(slot) {
                *entry = state;
            }
            SessionState::aggregate(&shards)
        };
        self.tx.send_if_modified(|current| {
            let changed = *current != aggregate;
            *current = aggregate;
            changed
        });
    }

    /// Resize for a new set of shards, all starting at `New`
    pub fn reset(&self, shards: usize) {
        *self.shards.lock() = vec![SessionState::New; shards];
        self.tx.send_replace(SessionState::New);
    }

    /// Mark every shard closed
    pub fn close_all(&self) {
        let mut shards = self.shards.lock();
        shards.iter_mut().for_each(|s| *s = SessionState::Closed);
        self.tx.send_replace(SessionState::Closed);
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}
