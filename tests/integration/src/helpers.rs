//! Test helpers for integration tests
//!
//! Provides a recording mock of the REST API and small timing utilities.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::{Json, Router};
use corvid_common::ClientConfig;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long any single expectation may take before the test fails
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// One request seen by [`MockRestServer`]
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub at: Instant,
}

/// REST mock that records the arrival time of every request
pub struct MockRestServer {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<Hit>>>,
    _handle: JoinHandle<()>,
}

impl MockRestServer {
    /// Serve `router`, which should route paths under `/api/v10`
    pub async fn start(router: Router) -> Result<Self> {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&hits);
        let app = router.layer(middleware::from_fn(move |req: Request, next: Next| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder.lock().push(Hit {
                    method: req.method().to_string(),
                    path: req.uri().path().to_string(),
                    at: Instant::now(),
                });
                next.run(req).await
            }
        }));

        let (addr, handle) = serve(app).await?;
        Ok(Self {
            addr,
            hits,
            _handle: handle,
        })
    }

    /// Mock that only answers `GET /gateway/bot`, pointing at `gateway_url`
    pub async fn with_gateway_bot(gateway_url: &str, shards: u32) -> Result<Self> {
        Self::start(gateway_bot_router(gateway_url, shards)).await
    }

    /// Value for `api_base_url`; the client appends the version
    pub fn api_base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Versioned base for building an `HttpClient` directly
    pub fn api_url(&self) -> String {
        format!("{}/v10", self.api_base_url())
    }

    /// Arrival times of requests to `path`, oldest first
    pub fn hits(&self, path: &str) -> Vec<Instant> {
        self.hits
            .lock()
            .iter()
            .filter(|hit| hit.path == path)
            .map(|hit| hit.at)
            .collect()
    }

    pub fn all_hits(&self) -> Vec<Hit> {
        self.hits.lock().clone()
    }
}

/// Router answering `GET /api/v10/gateway/bot`
pub fn gateway_bot_router(gateway_url: &str, shards: u32) -> Router {
    let body = serde_json::json!({
        "url": gateway_url,
        "shards": shards,
        "session_start_limit": {
            "total": 1000,
            "remaining": 999,
            "reset_after": 14_400_000,
            "max_concurrency": 1
        }
    });
    Router::new().route(
        "/api/v10/gateway/bot",
        get(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    )
}

/// Bind `app` on an ephemeral port and serve it in the background
pub async fn serve(app: Router) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, handle))
}

/// Client configuration pointed at the mocks, with token `T`
pub fn test_config(rest: &MockRestServer) -> corvid_common::ClientConfigBuilder {
    ClientConfig::builder("T")
        .api_base_url(rest.api_base_url())
        .handler_shutdown_timeout(Duration::from_secs(2))
}

/// Await `future`, failing the test after [`STEP_TIMEOUT`]
pub async fn within<F: Future>(what: &str, future: F) -> Result<F::Output> {
    tokio::time::timeout(STEP_TIMEOUT, future)
        .await
        .with_context(|| format!("timed out waiting for {what}"))
}

/// Wait until the watched value satisfies `predicate`
pub async fn wait_until<T, P>(rx: &mut watch::Receiver<T>, what: &str, predicate: P) -> Result<()>
where
    P: FnMut(&T) -> bool,
{
    within(what, rx.wait_for(predicate))
        .await?
        .map(|_| ())
        .with_context(|| format!("{what}: sender dropped"))
}
