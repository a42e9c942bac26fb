//! Serialised socket writer
//!
//! Heartbeats, IDENTIFY/RESUME and close frames take a priority path. Commands
//! (presence, voice state, member requests) wait in a queue that outlives the
//! connection, are drained only after READY or RESUMED, and pass through a
//! per-shard limit of 120 per minute.

use futures::{Sink, SinkExt};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::fmt::Display;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::protocol::GatewayFrame;

pub const COMMANDS_PER_MINUTE: u32 = 120;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket for gateway commands
#[derive(Debug)]
pub struct CommandLimiter {
    limiter: DirectRateLimiter,
}

impl CommandLimiter {
    /// `None` when `per_minute` is zero, meaning unlimited
    pub fn new(per_minute: u32) -> Option<Self> {
        NonZeroU32::new(per_minute).map(|n| Self {
            limiter: RateLimiter::direct(Quota::per_minute(n).allow_burst(n)),
        })
    }

    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a cell without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Frames on the priority path
#[derive(Debug)]
pub enum Outbound {
    Frame(GatewayFrame),
    /// Write a close frame and stop
    Close(u16, String),
}

/// Commands waiting for a connection, shared across reconnects
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<GatewayFrame>,
    /// Taken from the queue but not yet written
    pending: Option<GatewayFrame>,
}

impl CommandQueue {
    pub fn channel() -> (mpsc::UnboundedSender<GatewayFrame>, Arc<Mutex<Self>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Arc::new(Mutex::new(Self { rx, pending: None })))
    }
}

/// Write frames to `sink` until the priority channel closes or a write fails
pub async fn run_writer<S>(
    mut sink: S,
    mut priority: mpsc::UnboundedReceiver<Outbound>,
    queue: Arc<Mutex<CommandQueue>>,
    mut ready: watch::Receiver<bool>,
    limiter: Option<Arc<CommandLimiter>>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut queue = queue.lock().await;
    let queue = &mut *queue;

    loop {
        let is_ready = *ready.borrow_and_update();
        let has_pending = queue.pending.is_some();

        tokio::select! {
            biased;

            outbound = priority.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = write_frame(&mut sink, &frame).await {
                        debug!(error = %e, op = %frame.op, "Socket write failed");
                        break;
                    }
                }
                Some(Outbound::Close(code, reason)) => {
                    let close = CloseFrame {
                        code: WsCloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(close))).await {
                        debug!(error = %e, code, "Close frame not delivered");
                    }
                    break;
                }
                None => break,
            },

            changed = ready.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            Some(frame) = queue.rx.recv(), if is_ready && !has_pending => {
                queue.pending = Some(frame);
            }

            () = wait_for_cell(limiter.as_deref()), if is_ready && has_pending => {
                if let Some(frame) = queue.pending.take() {
                    if let Err(e) = write_frame(&mut sink, &frame).await {
                        warn!(error = %e, op = %frame.op, "Dropped gateway command: socket write failed");
                        break;
                    }
                }
            }
        }
    }
}

async fn wait_for_cell(limiter: Option<&CommandLimiter>) {
    if let Some(limiter) = limiter {
        limiter.until_ready().await;
    }
}

async fn write_frame<S>(sink: &mut S, frame: &GatewayFrame) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = frame.to_json().map_err(|e| e.to_string())?;
    trace!(op = %frame.op, "Writing frame");
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
