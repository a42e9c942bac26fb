//! Session: the handle an application holds
//!
//! Owns the REST client, the cache, the handler registry and one runner per
//! shard. Every operation goes through an explicit `Session`; nothing is
//! process-global.

use axum::Router;
use corvid_cache::{CacheConfig, InMemoryCache};
use corvid_common::ClientConfig;
use corvid_core::events::RateLimit;
use corvid_core::{Event, EventPayload};
use corvid_http::HttpClient;
use corvid_interactions::{IngressState, InteractionSink, SignatureVerifier};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::dispatch::{Context, Dispatcher, HandlerToken, Shared};
use crate::error::{GatewayError, Result};
use crate::protocol::{
    Inflater, PresenceUpdatePayload, RequestGuildMembersPayload, VoiceStateUpdatePayload,
};
use crate::shard::{
    Backoff, CommandLimiter, CommandQueue, GatewayUrl, SessionState, Shard, ShardId, ShardRunner,
    ShardStatus, StateBoard, COMMANDS_PER_MINUTE,
};

/// A connected (or connectable) client session
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ClientConfig>,
    shared: Arc<Shared>,
    dispatcher: Arc<Dispatcher>,
    board: Arc<StateBoard>,
    gateway_url: Arc<GatewayUrl>,
    shutdown: watch::Sender<bool>,
    ratelimits: Mutex<Option<mpsc::UnboundedReceiver<RateLimit>>>,
    tasks: Mutex<Vec<JoinHandle<Result<(), GatewayError>>>>,
}

impl Session {
    /// Build a session; nothing connects until [`connect`](Self::connect)
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate_config()?;

        let http = HttpClient::from_config(&config)?;
        let (ratelimit_tx, ratelimit_rx) = mpsc::unbounded_channel();
        http.set_ratelimit_observer(ratelimit_tx);

        let cache = Arc::new(InMemoryCache::with_config(CacheConfig::from_client(&config)));
        let shared = Arc::new(Shared::new(http, cache));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&shared)));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                shared,
                dispatcher,
                board: Arc::new(StateBoard::new(0)),
                gateway_url: Arc::new(GatewayUrl::default()),
                shutdown,
                ratelimits: Mutex::new(Some(ratelimit_rx)),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.inner.shared.http
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.inner.shared.cache
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Context not tied to any shard, for use outside handlers
    pub fn context(&self) -> Context {
        Context::new(Arc::clone(&self.inner.shared), None)
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Register a handler for events with payload type `E`
    pub fn on<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: EventPayload,
        F: Fn(Context, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.dispatcher.registry().on(handler)
    }

    /// Register a handler removed after its first event
    pub fn once<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: EventPayload,
        F: Fn(Context, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.dispatcher.registry().once(handler)
    }

    /// Register a catch-all handler; the only way to observe unknown events
    pub fn on_any<F, Fut>(&self, handler: F) -> HandlerToken
    where
        F: Fn(Context, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.dispatcher.registry().on_any(handler)
    }

    pub fn unregister(&self, token: HandlerToken) -> bool {
        self.inner.dispatcher.registry().unregister(token)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Aggregate state over every shard
    pub fn state(&self) -> SessionState {
        self.inner.board.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.board.subscribe()
    }

    /// Start every configured shard
    ///
    /// Without a configured shard count the gateway's recommendation is used,
    /// and the discovered URL is reused by every shard.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.shared.shards.read().is_empty() {
            return Err(GatewayError::AlreadyConnected.into());
        }

        let config = &inner.config;
        let count = match config.shard_count {
            Some(count) => count,
            None => {
                let bot = inner.shared.http.get_gateway_bot().await?;
                info!(
                    shards = bot.shards,
                    remaining_starts = bot.session_start_limit.remaining,
                    "Using recommended shard count"
                );
                inner.gateway_url.seed(bot.url);
                bot.shards
            }
        }
        .max(1);
        let indices: Vec<u32> = match config.shard_index {
            Some(index) => vec![index],
            None => (0..count).collect(),
        };

        if let Some(rx) = inner.ratelimits.lock().take() {
            tokio::spawn(Arc::clone(&inner.dispatcher).forward_ratelimits(rx));
        }

        inner.shared.shard_count.store(count, Ordering::Release);
        inner.board.reset(indices.len());
        inner.shutdown.send_replace(false);

        let mut tasks = inner.tasks.lock();
        for (slot, index) in indices.into_iter().enumerate() {
            let id = ShardId::new(index, count);
            let (commands_tx, commands) = CommandQueue::channel();
            let status = Arc::new(ShardStatus::default());
            inner
                .shared
                .shards
                .write()
                .insert(index, Shard::new(id, commands_tx, Arc::clone(&status)));

            let runner = ShardRunner {
                id,
                slot,
                config: Arc::clone(&inner.config),
                http: inner.shared.http.clone(),
                dispatcher: Arc::clone(&inner.dispatcher),
                status,
                board: Arc::clone(&inner.board),
                commands,
                limiter: CommandLimiter::new(COMMANDS_PER_MINUTE).map(Arc::new),
                gateway_url: Arc::clone(&inner.gateway_url),
                shutdown: inner.shutdown.subscribe(),
                backoff: Backoff::new(),
                inflater: Inflater::new(),
            };
            info!(shard = %id, "Starting shard");
            tasks.push(tokio::spawn(runner.run()));
        }
        Ok(())
    }

    /// Wait until every shard stops
    ///
    /// Returns the first fatal error, after asking the remaining shards to
    /// stop. Returns immediately if [`connect`](Self::connect) was not called.
    pub async fn run(&self) -> Result<()> {
        let mut tasks: FuturesUnordered<_> = std::mem::take(&mut *self.inner.tasks.lock())
            .into_iter()
            .collect();

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Session stopped by fatal gateway error");
                    self.inner.shutdown.send_replace(true);
                    return Err(e.into());
                }
                Err(e) => warn!(error = %e, "Shard task ended abnormally"),
            }
        }
        Ok(())
    }

    /// Connect, then run until every shard stops
    pub async fn start(&self) -> Result<()> {
        self.connect().await?;
        self.run().await
    }

    /// Close the session
    ///
    /// REST calls fail with `Closed` from here on. Shards send a 1000 close
    /// frame and stop, then in-flight handlers get up to the configured
    /// shutdown timeout to finish.
    pub async fn close(&self) {
        info!("Closing session");
        let inner = &self.inner;
        inner.shared.http.close();
        inner.shutdown.send_replace(true);

        let timeout = inner.config.handler_shutdown_timeout();
        if !inner.shared.shards.read().is_empty() {
            let mut state = inner.board.subscribe();
            let stopped = wait_for_state(&mut state, SessionState::Closed);
            if tokio::time::timeout(timeout, stopped).await.is_err() {
                warn!("Shards did not stop before the shutdown timeout");
            }
        }
        if !inner.dispatcher.wait_idle(timeout).await {
            warn!(
                in_flight = inner.dispatcher.registry().in_flight(),
                "Handlers still running after the shutdown timeout"
            );
        }

        inner.board.close_all();
        inner.shared.shards.write().clear();
        info!("Session closed");
    }

    // =========================================================================
    // Shards and commands
    // =========================================================================

    pub fn shard(&self, index: u32) -> Option<Shard> {
        self.inner.shared.shards.read().get(&index).cloned()
    }

    pub fn shards(&self) -> Vec<Shard> {
        self.context().shards()
    }

    pub fn update_presence(&self, presence: &PresenceUpdatePayload) -> Result<()> {
        Ok(self.context().update_presence(presence)?)
    }

    pub fn update_voice_state(&self, voice_state: &VoiceStateUpdatePayload) -> Result<()> {
        Ok(self.context().update_voice_state(voice_state)?)
    }

    /// Returns the nonce carried by the resulting member chunks
    pub fn request_guild_members(&self, request: RequestGuildMembersPayload) -> Result<String> {
        Ok(self.context().request_guild_members(request)?)
    }

    // =========================================================================
    // Interaction ingress
    // =========================================================================

    /// Router for signed interaction callbacks, delivering into this session
    ///
    /// Requires `public_key` in the configuration.
    pub fn interactions_router(&self) -> Result<Router> {
        let verifier = SignatureVerifier::from_config(&self.inner.config)?;
        let sink: Arc<dyn InteractionSink> = Arc::clone(&self.inner.dispatcher) as _;
        Ok(corvid_interactions::router(IngressState::new(verifier, sink)))
    }
}

async fn wait_for_state(rx: &mut watch::Receiver<SessionState>, target: SessionState) {
    let _ = rx.wait_for(|state| *state == target).await;
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("shards", &self.inner.shared.shards.read().len())
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use corvid_core::events::Connect;
    use corvid_core::Status;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::builder("token")
            .shard_count(2)
            .api_base_url("http://127.0.0.1:9/api")
            .gateway_url("ws://127.0.0.1:9")
            .handler_shutdown_timeout(Duration::from_millis(200))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = config();
        config.token = String::new();
        assert!(matches!(Session::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_commands_before_connect() {
        let session = Session::new(config()).unwrap();
        assert_eq!(session.state(), SessionState::New);
        assert!(session.shards().is_empty());
        assert!(session
            .update_presence(&PresenceUpdatePayload::new(Status::Online))
            .is_err());
    }

    #[test]
    fn test_interactions_router_requires_key() {
        let session = Session::new(config()).unwrap();
        assert!(matches!(
            session.interactions_router(),
            Err(Error::Ingress(_))
        ));
    }

    #[tokio::test]
    async fn test_handlers_registered_through_session() {
        let session = Session::new(config()).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = session.on(move |_ctx, event: Connect| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.resumed);
            }
        });

        session.dispatcher().emit(
            None,
            Connect {
                shard_id: 0,
                resumed: true,
            }
            .into(),
        );
        assert_eq!(rx.recv().await, Some(true));
        assert!(session.unregister(token));
    }

    #[tokio::test]
    async fn test_close_before_connect() {
        let session = Session::new(config()).unwrap();
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.http().is_closed());
        session.run().await.unwrap();
    }
}
