//! REST rate-limit tests against the mock API
//!
//! Run with: cargo test -p integration-tests --test ratelimit_tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use corvid_core::Snowflake;
use corvid_http::{CreateMessage, HttpClient, HttpError, Method, RouteKey};
use integration_tests::{message_json, user_json, within, MockRestServer};
use tokio::sync::mpsc;

const MESSAGES: &str = "/api/v10/channels/1/messages";

/// Slack for timer granularity between the client and the mock
const EPSILON: Duration = Duration::from_millis(50);

#[tokio::test]
async fn test_exhausted_bucket_delays_next_request() -> Result<()> {
    let router = Router::new().route(
        MESSAGES,
        post(|| async {
            (
                [
                    ("x-ratelimit-limit", "1"),
                    ("x-ratelimit-remaining", "0"),
                    ("x-ratelimit-reset-after", "2.0"),
                    ("x-ratelimit-bucket", "msg"),
                ],
                Json(message_json(10, 1, "caw")),
            )
        }),
    );
    let rest = MockRestServer::start(router).await?;
    let client = HttpClient::new("T", rest.api_url())?;

    client
        .create_message(Snowflake::new(1), CreateMessage::content("one"))
        .await?;
    client
        .create_message(Snowflake::new(1), CreateMessage::content("two"))
        .await?;

    let hits = rest.hits(MESSAGES);
    assert_eq!(hits.len(), 2);
    let gap = hits[1] - hits[0];
    assert!(gap >= Duration::from_secs(2) - EPSILON, "second request after {gap:?}");

    let route = RouteKey::new(&Method::POST, "/channels/1/messages");
    assert_eq!(client.ratelimiter().bucket_hash(&route).as_deref(), Some("msg"));
    Ok(())
}

#[tokio::test]
async fn test_global_429_pauses_other_routes() -> Result<()> {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let router = Router::new()
        .route(
            MESSAGES,
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (
                            StatusCode::TOO_MANY_REQUESTS,
                            [("x-ratelimit-global", "true"), ("retry-after", "3")],
                            Json(serde_json::json!({
                                "message": "You are being rate limited.",
                                "retry_after": 3.0,
                                "global": true
                            })),
                        )
                            .into_response()
                    } else {
                        Json(message_json(10, 1, "caw")).into_response()
                    }
                }
            }),
        )
        .route("/api/v10/users/@me", get(|| async { Json(user_json(1, "corvid")) }));
    let rest = MockRestServer::start(router).await?;
    let client = HttpClient::new("T", rest.api_url())?;
    let (observer, mut notices) = mpsc::unbounded_channel();
    client.set_ratelimit_observer(observer);

    let sender = client.clone();
    let message = tokio::spawn(async move {
        sender
            .create_message(Snowflake::new(1), CreateMessage::content("caw"))
            .await
    });

    // the 429 has been applied once the observer hears about it
    let notice = within("rate-limit notice", notices.recv()).await?;
    let notice = notice.ok_or_else(|| anyhow::anyhow!("observer closed"))?;
    assert!(notice.global);
    assert_eq!(notice.retry_after_ms, 3000);

    let user = client.get_current_user().await?;
    assert_eq!(user.username, "corvid");
    let message = message.await??;
    assert_eq!(message.content, "caw");

    let limited = rest.hits(MESSAGES)[0];
    let other = rest.hits("/api/v10/users/@me");
    assert_eq!(other.len(), 1);
    let gap = other[0] - limited;
    assert!(gap >= Duration::from_secs(3) - EPSILON, "other route after {gap:?}");

    let retried = rest.hits(MESSAGES)[1] - limited;
    assert!(retried >= Duration::from_secs(3) - EPSILON, "retry after {retried:?}");
    Ok(())
}

#[tokio::test]
async fn test_closed_client_sends_nothing() -> Result<()> {
    let router = Router::new().route("/api/v10/users/@me", get(|| async { Json(user_json(1, "corvid")) }));
    let rest = MockRestServer::start(router).await?;
    let client = HttpClient::new("T", rest.api_url())?;

    client.close();
    assert!(matches!(
        client.get_current_user().await,
        Err(HttpError::Closed)
    ));
    assert!(rest.all_hits().is_empty());
    Ok(())
}
