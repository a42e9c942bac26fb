//! Shard connection loop
//!
//! One runner drives one shard: connect, wait for HELLO, identify or resume,
//! then read frames and heartbeat until the connection ends. Every end picks
//! how to reconnect; fatal close codes stop the shard.

use corvid_common::ClientConfig;
use corvid_core::events::{Connect, Disconnect};
use corvid_core::Event;
use corvid_http::{HttpClient, HttpError};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, trace, warn};

use super::command::{run_writer, CommandLimiter, CommandQueue, Outbound};
use super::{Backoff, Heartbeat, SessionState, ShardId, ShardStatus, StateBoard, Tick};
use crate::dispatch::Dispatcher;
use crate::error::GatewayError;
use crate::protocol::{
    CloseCode, GatewayFrame, IdentifyPayload, IdentifyProperties, Inflater, OpCode,
};

const HELLO_TIMEOUT: Duration = Duration::from_secs(20);
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Code for closes the client initiates to keep the session resumable
const RESUMABLE_CLOSE: u16 = 4000;
const NORMAL_CLOSE: u16 = 1000;

/// Gateway URL from discovery, shared by every shard of a session
#[derive(Debug, Default)]
pub(crate) struct GatewayUrl {
    url: Mutex<Option<String>>,
}

impl GatewayUrl {
    pub(crate) fn seed(&self, url: String) {
        *self.url.lock() = Some(url);
    }

    pub(crate) fn invalidate(&self) {
        *self.url.lock() = None;
    }

    pub(crate) async fn get_or_fetch(&self, http: &HttpClient) -> Result<String, HttpError> {
        let cached = self.url.lock().clone();
        if let Some(url) = cached {
            return Ok(url);
        }
        let bot = http.get_gateway_bot().await?;
        debug!(url = %bot.url, "Discovered gateway URL");
        self.seed(bot.url.clone());
        Ok(bot.url)
    }
}

/// What to do after a connection ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconnect {
    Immediate,
    Backoff,
    After(Duration),
    Stop,
}

#[derive(Debug)]
struct ConnectionEnd {
    code: Option<u16>,
    reason: String,
    next: Reconnect,
}

impl ConnectionEnd {
    fn new(code: Option<u16>, reason: impl Into<String>, next: Reconnect) -> Self {
        Self {
            code,
            reason: reason.into(),
            next,
        }
    }
}

/// How a close frame from the gateway is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseAction {
    Fatal(CloseCode),
    Resume,
    Identify,
}

fn classify_close(code: Option<u16>, reconnect_on_error: bool) -> CloseAction {
    let Some(close) = code.and_then(CloseCode::from_u16) else {
        return CloseAction::Resume;
    };
    if close.is_fatal() && (close.is_authentication() || !reconnect_on_error) {
        return CloseAction::Fatal(close);
    }
    if close.can_resume() {
        CloseAction::Resume
    } else {
        CloseAction::Identify
    }
}

enum Inbound {
    Frame(GatewayFrame),
    Closed(Option<u16>, String),
}

/// Read the next gateway frame, inflating binary frames and skipping
/// anything that does not parse
async fn next_frame<S>(inflater: &mut Inflater, stream: &mut S) -> Result<Inbound, GatewayError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let Some(message) = stream.next().await else {
            return Ok(Inbound::Closed(None, "connection reset".to_string()));
        };
        let text = match message? {
            Message::Text(text) => text,
            Message::Binary(bytes) => match inflater.push(&bytes)? {
                Some(text) => text,
                None => continue,
            },
            Message::Close(Some(frame)) => {
                return Ok(Inbound::Closed(
                    Some(u16::from(frame.code)),
                    frame.reason.into_owned(),
                ))
            }
            Message::Close(None) => return Ok(Inbound::Closed(None, String::new())),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };
        match GatewayFrame::from_json(&text) {
            Ok(frame) => return Ok(Inbound::Frame(frame)),
            Err(e) => warn!(error = %e, "Skipping malformed gateway frame"),
        }
    }
}

/// Resolves once the session asks shards to stop
async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender also means stop
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub(crate) struct ShardRunner {
    pub(crate) id: ShardId,
    pub(crate) slot: usize,
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) http: HttpClient,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) status: Arc<ShardStatus>,
    pub(crate) board: Arc<StateBoard>,
    pub(crate) commands: Arc<tokio::sync::Mutex<CommandQueue>>,
    pub(crate) limiter: Option<Arc<CommandLimiter>>,
    pub(crate) gateway_url: Arc<GatewayUrl>,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) backoff: Backoff,
    pub(crate) inflater: Inflater,
}

impl ShardRunner {
    /// Run until shutdown or a fatal error
    pub(crate) async fn run(mut self) -> Result<(), GatewayError> {
        let mut delay = Duration::ZERO;
        let result = loop {
            if !delay.is_zero() {
                debug!(shard = %self.id, ?delay, "Waiting before reconnect");
                if !self.sleep_or_shutdown(delay).await {
                    break Ok(());
                }
            }
            if *self.shutdown.borrow() {
                break Ok(());
            }

            self.set_state(SessionState::Connecting);
            match self.connect_once().await {
                Ok(end) => {
                    let reconnecting = end.next != Reconnect::Stop;
                    self.emit_disconnect(end.code, end.reason, reconnecting);
                    delay = match end.next {
                        Reconnect::Stop => break Ok(()),
                        Reconnect::Immediate => Duration::ZERO,
                        Reconnect::Backoff => self.backoff.next_delay(),
                        Reconnect::After(delay) => delay,
                    };
                }
                Err(e) if e.is_fatal() => {
                    error!(shard = %self.id, error = %e, "Shard stopped");
                    let code = match &e {
                        GatewayError::FatalClose { code, .. } => Some(*code),
                        _ => None,
                    };
                    self.emit_disconnect(code, e.to_string(), false);
                    break Err(e);
                }
                Err(e) => {
                    warn!(shard = %self.id, error = %e, "Gateway connection failed");
                    self.gateway_url.invalidate();
                    self.emit_disconnect(None, e.to_string(), true);
                    delay = self.backoff.next_delay();
                }
            }
            self.set_state(SessionState::Reconnecting);
        };

        self.set_state(SessionState::Closed);
        info!(shard = %self.id, "Shard closed");
        result
    }

    async fn sleep_or_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = sleep(delay) => true,
            () = shutdown_signal(&mut self.shutdown) => false,
        }
    }

    async fn connect_once(&mut self) -> Result<ConnectionEnd, GatewayError> {
        let url = self.connect_url().await?;
        info!(shard = %self.id, url = %url, "Connecting to gateway");

        let (socket, _) = connect_async(url.as_str()).await?;
        let (sink, mut stream) = socket.split();
        self.inflater.reset();

        let (out, priority) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);
        let mut writer = tokio::spawn(run_writer(
            sink,
            priority,
            Arc::clone(&self.commands),
            ready_rx,
            self.limiter.clone(),
        ));

        let result = self.drive(&mut stream, &out, &ready_tx).await;
        if result.is_err() {
            let _ = out.send(Outbound::Close(RESUMABLE_CLOSE, "client error".to_string()));
        }

        drop(out);
        if timeout(WRITER_DRAIN, &mut writer).await.is_err() {
            writer.abort();
        }
        result
    }

    async fn connect_url(&self) -> Result<Url, GatewayError> {
        let resume_url = {
            let resume = self.status.resume.lock();
            resume
                .can_resume()
                .then(|| resume.resume_url.clone())
                .flatten()
        };
        let base = match resume_url.or_else(|| self.config.gateway_url.clone()) {
            Some(url) => url,
            None => self.gateway_url.get_or_fetch(&self.http).await?,
        };

        let mut url =
            Url::parse(&base).map_err(|e| GatewayError::InvalidUrl(format!("{base}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .clear()
                .append_pair("v", &self.config.gateway_version.to_string())
                .append_pair("encoding", "json");
            if self.config.compress {
                query.append_pair("compress", "zlib-stream");
            }
        }
        Ok(url)
    }

    async fn drive<S>(
        &mut self,
        stream: &mut S,
        out: &mpsc::UnboundedSender<Outbound>,
        ready: &watch::Sender<bool>,
    ) -> Result<ConnectionEnd, GatewayError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let hello = match timeout(HELLO_TIMEOUT, next_frame(&mut self.inflater, stream)).await {
            Err(_) => return Err(GatewayError::Protocol("no HELLO from gateway".to_string())),
            Ok(inbound) => match inbound? {
                Inbound::Frame(frame) => frame.as_hello().ok_or_else(|| {
                    GatewayError::Protocol(format!("expected HELLO, got {}", frame.op))
                })?,
                Inbound::Closed(code, reason) => return self.on_close(code, reason),
            },
        };

        let mut heartbeat = Heartbeat::new(Duration::from_millis(hello.heartbeat_interval));
        debug!(shard = %self.id, interval = ?heartbeat.interval(), "Received HELLO");

        let handshake = self.handshake_frame()?;
        send(out, handshake)?;
        self.set_state(SessionState::Identified);

        let mut next_beat = Instant::now() + heartbeat.first_delay();
        loop {
            tokio::select! {
                () = shutdown_signal(&mut self.shutdown) => {
                    let _ = out.send(Outbound::Close(NORMAL_CLOSE, "session closed".to_string()));
                    return Ok(ConnectionEnd::new(Some(NORMAL_CLOSE), "session closed", Reconnect::Stop));
                }
                () = sleep_until(next_beat) => {
                    match heartbeat.on_tick(Instant::now()) {
                        Tick::Send => {
                            let sequence = self.status.sequence();
                            trace!(shard = %self.id, ?sequence, "Sending heartbeat");
                            send(out, GatewayFrame::heartbeat(sequence))?;
                            next_beat = Instant::now() + heartbeat.interval();
                        }
                        Tick::Zombie => {
                            warn!(shard = %self.id, "Heartbeat not acknowledged, reconnecting");
                            let _ = out.send(Outbound::Close(RESUMABLE_CLOSE, "zombie connection".to_string()));
                            return Ok(ConnectionEnd::new(
                                Some(RESUMABLE_CLOSE),
                                "heartbeat not acknowledged",
                                Reconnect::Immediate,
                            ));
                        }
                    }
                }
                inbound = next_frame(&mut self.inflater, stream) => match inbound? {
                    Inbound::Frame(frame) => {
                        if let Some(end) = self.handle_frame(frame, &mut heartbeat, out, ready)? {
                            return Ok(end);
                        }
                    }
                    Inbound::Closed(code, reason) => return self.on_close(code, reason),
                },
            }
        }
    }

    fn handshake_frame(&self) -> Result<GatewayFrame, GatewayError> {
        let mut resume = self.status.resume.lock();
        if let Some(payload) = resume.resume_payload(&self.config.token) {
            info!(shard = %self.id, session_id = %payload.session_id, seq = payload.seq, "Resuming session");
            return GatewayFrame::resume(&payload).map_err(GatewayError::from);
        }

        // a fresh session starts its sequence over
        resume.clear();
        let identify = IdentifyPayload::new(
            self.config.token.clone(),
            self.config.intents,
            IdentifyProperties::new(&self.config.client_name),
        )
        .with_shard(self.id.index, self.id.count)
        .with_large_threshold(self.config.large_threshold);
        info!(shard = %self.id, "Identifying");
        GatewayFrame::identify(&identify).map_err(GatewayError::from)
    }

    fn handle_frame(
        &mut self,
        frame: GatewayFrame,
        heartbeat: &mut Heartbeat,
        out: &mpsc::UnboundedSender<Outbound>,
        ready: &watch::Sender<bool>,
    ) -> Result<Option<ConnectionEnd>, GatewayError> {
        match frame.op {
            OpCode::Dispatch => self.on_dispatch(frame, ready),
            OpCode::Heartbeat => {
                debug!(shard = %self.id, "Gateway requested heartbeat");
                send(out, GatewayFrame::heartbeat(self.status.sequence()))?;
            }
            OpCode::HeartbeatAck => {
                if let Some(latency) = heartbeat.on_ack(Instant::now()) {
                    trace!(shard = %self.id, ?latency, "Heartbeat acknowledged");
                    *self.status.latency.lock() = Some(latency);
                }
            }
            OpCode::Reconnect => {
                info!(shard = %self.id, "Gateway requested reconnect");
                let _ = out.send(Outbound::Close(RESUMABLE_CLOSE, "reconnect requested".to_string()));
                return Ok(Some(ConnectionEnd::new(
                    Some(RESUMABLE_CLOSE),
                    "reconnect requested",
                    Reconnect::Immediate,
                )));
            }
            OpCode::InvalidSession => {
                let resumable = frame.is_resumable();
                let delay = if resumable {
                    Duration::from_millis(rand::thread_rng().gen_range(500..=1500))
                } else {
                    self.status.resume.lock().clear();
                    Duration::from_millis(rand::thread_rng().gen_range(1000..=5000))
                };
                warn!(shard = %self.id, resumable, ?delay, "Session invalidated");
                let _ = out.send(Outbound::Close(RESUMABLE_CLOSE, "session invalidated".to_string()));
                return Ok(Some(ConnectionEnd::new(
                    Some(RESUMABLE_CLOSE),
                    "invalid session",
                    Reconnect::After(delay),
                )));
            }
            OpCode::Hello => debug!(shard = %self.id, "Ignoring repeated HELLO"),
            op => warn!(shard = %self.id, op = %op, "Unexpected opcode from gateway"),
        }
        Ok(None)
    }

    fn on_dispatch(&mut self, frame: GatewayFrame, ready: &watch::Sender<bool>) {
        let Some(name) = frame.t else {
            warn!(shard = %self.id, "Dispatch without event name");
            return;
        };
        if let Some(sequence) = frame.s {
            if !self.status.resume.lock().observe(sequence) {
                debug!(shard = %self.id, sequence, event = %name, "Skipping replayed dispatch");
                return;
            }
        }

        let event = match Event::decode(&name, frame.d) {
            Ok(event) => event,
            Err(e) => {
                warn!(shard = %self.id, event = %name, error = %e, "Skipping undecodable dispatch");
                return;
            }
        };

        let connected = match &event {
            Event::Ready(payload) => {
                info!(
                    shard = %self.id,
                    session_id = %payload.session_id,
                    guilds = payload.guilds.len(),
                    "Shard ready"
                );
                self.status
                    .resume
                    .lock()
                    .start(payload.session_id.clone(), payload.resume_gateway_url.clone());
                Some(false)
            }
            Event::Resumed(_) => {
                info!(shard = %self.id, sequence = ?self.status.sequence(), "Session resumed");
                Some(true)
            }
            _ => None,
        };

        self.dispatcher.dispatch(self.id, event);

        if let Some(resumed) = connected {
            self.backoff.reset();
            self.set_state(SessionState::Ready);
            ready.send_replace(true);
            self.dispatcher.emit(
                Some(self.id),
                Event::Connect(Connect {
                    shard_id: self.id.index,
                    resumed,
                }),
            );
        }
    }

    fn on_close(&self, code: Option<u16>, reason: String) -> Result<ConnectionEnd, GatewayError> {
        match classify_close(code, self.config.reconnect_on_error) {
            CloseAction::Fatal(close) => {
                error!(shard = %self.id, code = close.as_u16(), reason = %reason, "Gateway closed with a fatal code");
                return Err(GatewayError::fatal_close(close));
            }
            CloseAction::Identify => {
                info!(shard = %self.id, ?code, "Session cannot be resumed");
                self.status.resume.lock().clear();
            }
            CloseAction::Resume => {
                info!(shard = %self.id, ?code, reason = %reason, "Gateway closed the connection");
            }
        }
        Ok(ConnectionEnd::new(code, reason, Reconnect::Backoff))
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.status.state.lock(), state);
        if previous != state {
            debug!(shard = %self.id, from = %previous, to = %state, "Shard state changed");
        }
        self.board.set(self.slot, state);
    }

    fn emit_disconnect(&self, code: Option<u16>, reason: String, will_reconnect: bool) {
        self.dispatcher.emit(
            Some(self.id),
            Event::Disconnect(Disconnect {
                shard_id: self.id.index,
                code,
                reason,
                will_reconnect,
            }),
        );
    }
}

fn send(out: &mpsc::UnboundedSender<Outbound>, frame: GatewayFrame) -> Result<(), GatewayError> {
    out.send(Outbound::Frame(frame))
        .map_err(|_| GatewayError::Closed)
}
