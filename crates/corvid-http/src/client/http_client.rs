//! HTTP requester
//!
//! Every call goes through the rate-limit coordinator. 429s are retried once
//! after `Retry-After`; 5xx and transport failures up to three times with
//! backoff.

use corvid_common::ClientConfig;
use parking_lot::RwLock;
use rand::Rng;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::request::{Request, RequestBody, Response};
use crate::error::HttpError;
use crate::ratelimit::{body_retry_after, RateLimitHeaders, RateLimitObserver, RateLimiter};

/// Retries after a 5xx or transport error
const MAX_SERVER_RETRIES: u32 = 3;

/// First 5xx backoff; doubles per attempt
const SERVER_BACKOFF_BASE: Duration = Duration::from_millis(500);

const USER_AGENT: &str = concat!("DiscordBot (corvid, ", env!("CARGO_PKG_VERSION"), ")");

/// REST client handle; clones share the token, buckets and closed flag
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    /// Versioned base, e.g. `https://discord.com/api/v10`
    api_url: String,
    token: RwLock<Option<String>>,
    ratelimiter: RateLimiter,
    closed: AtomicBool,
}

impl HttpClient {
    /// Client for `api_url` with default transport settings
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_http(http, Some(token.into()), api_url.into()))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self::with_http(http, Some(config.token.clone()), config.api_url()))
    }

    fn with_http(http: reqwest::Client, token: Option<String>, api_url: String) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                api_url: api_url.trim_end_matches('/').to_string(),
                token: RwLock::new(token),
                ratelimiter: RateLimiter::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.inner.api_url
    }

    pub fn ratelimiter(&self) -> &RateLimiter {
        &self.inner.ratelimiter
    }

    /// Forward rate-limit notifications to `observer`
    pub fn set_ratelimit_observer(&self, observer: RateLimitObserver) {
        self.inner.ratelimiter.set_observer(observer);
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.inner.token.write() = Some(token.into());
    }

    pub fn has_token(&self) -> bool {
        self.inner.token.read().is_some()
    }

    /// Reject all further calls with [`HttpError::Closed`]
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Perform `request`, returning the raw response on success
    pub async fn request(&self, request: Request) -> Result<Response, HttpError> {
        self.ensure_open()?;
        match request.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.execute(&request))
                .await
                .map_err(|_| HttpError::Cancelled)?,
            None => self.execute(&request).await,
        }
    }

    async fn execute(&self, request: &Request) -> Result<Response, HttpError> {
        let limiter = &self.inner.ratelimiter;
        let mut rate_limited = false;
        let mut server_retries = 0;

        loop {
            self.ensure_open()?;
            let slot = limiter.acquire(&request.route).await;

            let (status, headers, body) = match self.exchange(request).await {
                Ok(parts) => parts,
                Err(HttpError::Transport(e)) if server_retries < MAX_SERVER_RETRIES => {
                    slot.restore().await;
                    server_retries += 1;
                    tracing::warn!(route = %request.route, error = %e, attempt = server_retries, "Transport error, retrying");
                    tokio::time::sleep(server_backoff(server_retries)).await;
                    continue;
                }
                Err(e) => {
                    slot.restore().await;
                    return Err(e);
                }
            };

            let mut limits = RateLimitHeaders::parse(&headers);
            if status == StatusCode::TOO_MANY_REQUESTS && limits.retry_after.is_none() {
                limits.retry_after = body_retry_after(&body);
            }
            let retry_after = limiter
                .release(&request.route, slot, status, &limits)
                .await;

            tracing::debug!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "REST call completed"
            );

            if status.is_success() {
                return Ok(Response {
                    status,
                    headers,
                    body,
                });
            }

            match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = retry_after.unwrap_or_default();
                    if rate_limited {
                        return Err(HttpError::RateLimited {
                            retry_after,
                            global: limits.global,
                        });
                    }
                    rate_limited = true;
                    tokio::time::sleep(retry_after).await;
                }
                s if s.is_server_error() => {
                    if server_retries >= MAX_SERVER_RETRIES {
                        return Err(HttpError::Server { status: s.as_u16() });
                    }
                    server_retries += 1;
                    tracing::warn!(route = %request.route, status = s.as_u16(), attempt = server_retries, "Server error, retrying");
                    tokio::time::sleep(server_backoff(server_retries)).await;
                }
                StatusCode::UNAUTHORIZED => {
                    if self.inner.token.write().take().is_some() {
                        tracing::error!("Token rejected, clearing it");
                    }
                    return Err(HttpError::Unauthorized);
                }
                StatusCode::FORBIDDEN => {
                    return Err(HttpError::Forbidden {
                        message: error_message(&body),
                    })
                }
                StatusCode::NOT_FOUND => {
                    return Err(HttpError::NotFound {
                        message: error_message(&body),
                    })
                }
                s => {
                    return Err(HttpError::Status {
                        status: s.as_u16(),
                        body: String::from_utf8_lossy(&body).into_owned(),
                    })
                }
            }
        }
    }

    /// Send `request` and read the whole response
    async fn exchange(
        &self,
        request: &Request,
    ) -> Result<(StatusCode, reqwest::header::HeaderMap, bytes::Bytes), HttpError> {
        let response = self.send(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok((status, headers, body))
    }

    async fn send(&self, request: &Request) -> Result<reqwest::Response, HttpError> {
        let url = format!("{}{}", self.inner.api_url, request.path);
        let mut builder = self.inner.http.request(request.method.clone(), url);

        if request.authenticated {
            let authorization = self.authorization()?;
            builder = builder.header(AUTHORIZATION, authorization);
        }
        if let Some(reason) = &request.reason {
            let value = HeaderValue::from_str(reason)
                .map_err(|_| HttpError::InvalidRequest("audit log reason is not a valid header".into()))?;
            builder = builder.header("X-Audit-Log-Reason", value);
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart { payload, files }) => {
                builder.multipart(RequestBody::to_form(payload, files)?)
            }
            None => builder,
        };

        Ok(builder.send().await?)
    }

    fn authorization(&self) -> Result<HeaderValue, HttpError> {
        let token = self.inner.token.read();
        let token = token.as_deref().ok_or(HttpError::Unauthorized)?;
        let value = if token.starts_with("Bot ") || token.starts_with("Bearer ") {
            token.to_string()
        } else {
            format!("Bot {token}")
        };
        let mut header = HeaderValue::from_str(&value)
            .map_err(|_| HttpError::InvalidRequest("token is not a valid header value".into()))?;
        header.set_sensitive(true);
        Ok(header)
    }

    fn ensure_open(&self) -> Result<(), HttpError> {
        if self.is_closed() {
            Err(HttpError::Closed)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("api_url", &self.inner.api_url)
            .field("has_token", &self.has_token())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn server_backoff(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..=250);
    SERVER_BACKOFF_BASE * 2u32.pow(attempt.saturating_sub(1)) + Duration::from_millis(jitter)
}

/// `message` of a JSON error body, or the raw text
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_backoff_doubles() {
        let first = server_backoff(1);
        let third = server_backoff(3);
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(750));
        assert!(third >= Duration::from_secs(2) && third <= Duration::from_millis(2250));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(br#"{"message": "Unknown Channel", "code": 10003}"#), "Unknown Channel");
        assert_eq!(error_message(b"gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_authorization_prefix() {
        let client = HttpClient::new("abc", "http://localhost/api/v10").unwrap();
        assert_eq!(client.authorization().unwrap(), "Bot abc");

        client.set_token("Bearer xyz");
        assert_eq!(client.authorization().unwrap(), "Bearer xyz");
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let client = HttpClient::new("abc", "http://localhost/api/v10").unwrap();
        client.close();
        let err = client.request(Request::get("/users/@me")).await.unwrap_err();
        assert!(matches!(err, HttpError::Closed));
    }

    async fn spawn(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/v10")
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        use axum::{response::IntoResponse, routing::get, Json, Router};
        use std::sync::atomic::AtomicU32;

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/v10/users/@me",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        StatusCode::BAD_GATEWAY.into_response()
                    } else {
                        Json(serde_json::json!({"id": "1", "username": "corvid"})).into_response()
                    }
                }
            }),
        );

        let client = HttpClient::new("abc", spawn(router).await).unwrap();
        let user = client.get_current_user().await.unwrap();
        assert_eq!(user.username, "corvid");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token() {
        use axum::{routing::get, Router};

        let router = Router::new().route("/api/v10/users/@me", get(|| async { StatusCode::UNAUTHORIZED }));
        let client = HttpClient::new("abc", spawn(router).await).unwrap();

        let err = client.get_current_user().await.unwrap_err();
        assert!(matches!(err, HttpError::Unauthorized));
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn test_second_429_surfaces_rate_limited() {
        use axum::{response::IntoResponse, routing::post, Router};

        let router = Router::new().route(
            "/api/v10/channels/1/messages",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", "0.05")],
                    r#"{"message": "You are being rate limited.", "retry_after": 0.05, "global": false}"#,
                )
                    .into_response()
            }),
        );
        let client = HttpClient::new("abc", spawn(router).await).unwrap();

        let err = client
            .request(Request::post("/channels/1/messages").json(serde_json::json!({"content": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::RateLimited { global: false, .. }));
    }

    #[tokio::test]
    async fn test_deadline_cancels() {
        use axum::{routing::get, Router};

        let router = Router::new().route(
            "/api/v10/users/@me",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let client = HttpClient::new("abc", spawn(router).await).unwrap();

        let err = client
            .request(Request::get("/users/@me").deadline(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Cancelled));
    }

    #[tokio::test]
    async fn test_truncated_body_is_retried() {
        use axum::body::Body;
        use axum::{response::IntoResponse, routing::get, Json, Router};
        use std::sync::atomic::AtomicU32;

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/v10/users/@me",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
                            Ok(bytes::Bytes::from_static(br#"{"id": "1", "#)),
                            Err(std::io::Error::other("connection cut")),
                        ];
                        Body::from_stream(futures::stream::iter(chunks)).into_response()
                    } else {
                        Json(serde_json::json!({"id": "1", "username": "corvid"})).into_response()
                    }
                }
            }),
        );

        let client = HttpClient::new("abc", spawn(router).await).unwrap();
        let user = client.get_current_user().await.unwrap();
        assert_eq!(user.username, "corvid");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_returns_slot() {
        // bound then released, so nothing listens there
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new("abc", format!("http://{addr}/api/v10")).unwrap();
        let err = client.get_current_user().await.unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));

        let route = crate::RouteKey::new(&reqwest::Method::GET, "/users/@me");
        let state = client.ratelimiter().bucket(&route).snapshot().await;
        assert_eq!(state.remaining, 1);
    }

    #[tokio::test]
    async fn test_cancelled_request_frees_bucket() {
        use axum::{response::IntoResponse, routing::get, Json, Router};
        use std::sync::atomic::AtomicU32;

        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/api/v10/users/@me",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Json(serde_json::json!({"id": "1", "username": "corvid"})).into_response()
                }
            }),
        );
        let client = HttpClient::new("abc", spawn(router).await).unwrap();

        let err = client
            .request(Request::get("/users/@me").deadline(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Cancelled));

        // the fresh bucket admits one request until a response or a hand-back
        let user = tokio::time::timeout(Duration::from_secs(2), client.get_current_user())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.username, "corvid");
    }

    #[test]
    fn test_api_url_trailing_slash() {
        let client = HttpClient::new("abc", "http://localhost/api/v10/").unwrap();
        assert_eq!(client.api_url(), "http://localhost/api/v10");
    }
}
