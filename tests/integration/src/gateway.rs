//! Scriptable mock gateway
//!
//! Every WebSocket the client opens is handed to the test as a
//! [`GatewayConnection`], which sends frames on the server's behalf and
//! exposes what the client wrote.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::{bail, Context as _, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use corvid_gateway::{GatewayFrame, OpCode};
use flate2::{Compress, Compression, FlushCompress};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::helpers::{serve, within};

/// Something the client wrote to the socket
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Frame(GatewayFrame),
    /// Close frame with its code, if any
    Close(Option<u16>),
}

/// Gateway mock serving WebSocket upgrades on `/`
pub struct MockGateway {
    pub addr: SocketAddr,
    accepted: mpsc::UnboundedReceiver<GatewayConnection>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let (tx, accepted) = mpsc::unbounded_channel();
        let app = Router::new().route("/", get(upgrade)).with_state(tx);
        let (addr, handle) = serve(app).await?;
        Ok(Self {
            addr,
            accepted,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next connection the client opens
    pub async fn accept(&mut self) -> Result<GatewayConnection> {
        within("a gateway connection", self.accepted.recv())
            .await?
            .context("gateway mock stopped")
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(accepted): State<mpsc::UnboundedSender<GatewayConnection>>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, query, accepted))
}

async fn serve_socket(
    socket: WebSocket,
    query: HashMap<String, String>,
    accepted: mpsc::UnboundedSender<GatewayConnection>,
) {
    let (mut sink, mut stream) = socket.split();
    let (incoming_tx, incoming) = mpsc::unbounded_channel();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

    let connection = GatewayConnection {
        query,
        incoming,
        outgoing,
        compressor: None,
    };
    if accepted.send(connection).is_err() {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let seen = match message {
            Message::Text(text) => match serde_json::from_str(&text) {
                Ok(frame) => ClientMessage::Frame(frame),
                Err(_) => continue,
            },
            Message::Close(frame) => {
                let _ = incoming_tx.send(ClientMessage::Close(frame.map(|f| f.code)));
                break;
            }
            _ => continue,
        };
        if incoming_tx.send(seen).is_err() {
            break;
        }
    }
    writer.abort();
}

/// Server side of one client connection
pub struct GatewayConnection {
    /// Query string the client connected with
    pub query: HashMap<String, String>,
    incoming: mpsc::UnboundedReceiver<ClientMessage>,
    outgoing: mpsc::UnboundedSender<Message>,
    compressor: Option<Compress>,
}

impl GatewayConnection {
    /// Send later frames as one zlib stream in binary messages
    pub fn enable_compression(&mut self) {
        self.compressor = Some(Compress::new(Compression::default(), true));
    }

    pub fn send(&mut self, frame: &GatewayFrame) -> Result<()> {
        let json = frame.to_json()?;
        let message = match self.compressor.as_mut() {
            Some(compressor) => Message::Binary(deflate_sync(compressor, json.as_bytes())?),
            None => Message::Text(json),
        };
        self.outgoing
            .send(message)
            .map_err(|_| anyhow::anyhow!("client connection already gone"))
    }

    pub fn hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(&GatewayFrame::hello(heartbeat_interval_ms))
    }

    pub fn dispatch(&mut self, event: &str, sequence: u64, data: Value) -> Result<()> {
        self.send(&GatewayFrame::dispatch(event, sequence, data))
    }

    pub fn heartbeat_ack(&mut self) -> Result<()> {
        self.send(&GatewayFrame::heartbeat_ack())
    }

    pub fn close(&self, code: u16, reason: &'static str) -> Result<()> {
        self.outgoing
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: Cow::Borrowed(reason),
            })))
            .map_err(|_| anyhow::anyhow!("client connection already gone"))
    }

    pub async fn recv(&mut self) -> Result<ClientMessage> {
        within("a client message", self.incoming.recv())
            .await?
            .context("client disconnected without a close frame")
    }

    /// Next frame with `op`, skipping heartbeats; any other frame fails
    pub async fn expect_op(&mut self, op: OpCode) -> Result<GatewayFrame> {
        loop {
            match self.recv().await? {
                ClientMessage::Frame(frame) if frame.op == op => return Ok(frame),
                ClientMessage::Frame(frame) if frame.op == OpCode::Heartbeat => {}
                ClientMessage::Frame(frame) => bail!("expected {op}, client sent {}", frame.op),
                ClientMessage::Close(code) => bail!("expected {op}, client closed with {code:?}"),
            }
        }
    }

    /// Close code the client eventually sends, skipping frames
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let ClientMessage::Close(code) = self.recv().await? {
                return Ok(code);
            }
        }
    }
}

/// Deflate `input` with a sync flush, so it ends in `00 00 ff ff`
fn deflate_sync(compressor: &mut Compress, input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() + 64);
    let mut consumed = 0;
    loop {
        if output.capacity() - output.len() < 64 {
            output.reserve(input.len() + 64);
        }
        let before = compressor.total_in();
        compressor.compress_vec(&input[consumed..], &mut output, FlushCompress::Sync)?;
        consumed += usize::try_from(compressor.total_in() - before)?;
        if consumed == input.len() && output.ends_with(&[0x00, 0x00, 0xff, 0xff]) {
            return Ok(output);
        }
    }
}
