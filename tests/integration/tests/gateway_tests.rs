//! Gateway session tests against the mock gateway
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use corvid_core::events::{Connect, Disconnect, GuildCreate};
use corvid_gateway::{
    Context, Error, GatewayError, GatewayFrame, OpCode, PresenceUpdatePayload, Session, SessionState,
    Snowflake, Status,
};
use integration_tests::{
    guild_json, ready_json, test_config, wait_until, within, MockGateway, MockRestServer,
};
use serde_json::json;
use tokio::sync::mpsc;

/// Forward every `Connect` event's `resumed` flag
fn watch_connects(session: &Session) -> mpsc::UnboundedReceiver<bool> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.on(move |_ctx, event: Connect| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event.resumed);
        }
    });
    rx
}

// ============================================================================
// Identify
// ============================================================================

#[tokio::test]
async fn test_fresh_identify_with_discovery() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let session = Session::new(test_config(&rest).build()?)?;
    let mut connects = watch_connects(&session);
    let mut states = session.subscribe_state();

    session.connect().await?;
    let mut conn = gateway.accept().await?;
    assert_eq!(conn.query.get("v").map(String::as_str), Some("10"));
    assert_eq!(conn.query.get("encoding").map(String::as_str), Some("json"));
    assert!(!conn.query.contains_key("compress"));

    conn.hello(45_000)?;
    let identify = conn.expect_op(OpCode::Identify).await?;
    assert_eq!(identify.d["token"], "T");
    assert_eq!(identify.d["shard"], json!([0, 1]));
    wait_until(&mut states, "Identified", |s| *s == SessionState::Identified).await?;

    conn.dispatch("READY", 1, ready_json("S", &[20, 21], None))?;
    wait_until(&mut states, "Ready", |s| *s == SessionState::Ready).await?;
    assert_eq!(within("connect event", connects.recv()).await?, Some(false));

    let cache = session.cache();
    assert!(cache.is_unavailable(Snowflake::new(20)));
    assert!(cache.is_unavailable(Snowflake::new(21)));
    assert_eq!(
        cache.current_user().map(|u| u.username).as_deref(),
        Some("corvid")
    );

    let shard = session.shard(0).expect("shard 0 running");
    assert_eq!(shard.session_id().as_deref(), Some("S"));
    assert_eq!(shard.sequence(), Some(1));
    assert_eq!(rest.hits("/api/v10/gateway/bot").len(), 1);

    session.close().await;
    assert_eq!(conn.expect_close().await?, Some(1000));
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_commands_flow_after_ready() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;
    let mut states = session.subscribe_state();

    session.connect().await?;
    let mut conn = gateway.accept().await?;

    // queued before READY, written once the session is up
    session.update_presence(&PresenceUpdatePayload::new(Status::Idle))?;

    conn.hello(45_000)?;
    conn.expect_op(OpCode::Identify).await?;
    conn.dispatch("READY", 1, ready_json("S", &[], None))?;
    wait_until(&mut states, "Ready", |s| *s == SessionState::Ready).await?;

    let presence = conn.expect_op(OpCode::PresenceUpdate).await?;
    assert_eq!(presence.d["status"], "idle");
    assert!(rest.hits("/api/v10/gateway/bot").is_empty());

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_zlib_stream_transport() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .compress(true)
        .build()?;
    let session = Session::new(config)?;
    let mut states = session.subscribe_state();

    session.connect().await?;
    let mut conn = gateway.accept().await?;
    assert_eq!(
        conn.query.get("compress").map(String::as_str),
        Some("zlib-stream")
    );

    conn.enable_compression();
    conn.hello(45_000)?;
    conn.expect_op(OpCode::Identify).await?;
    conn.dispatch("READY", 1, ready_json("S", &[], None))?;
    conn.dispatch("GUILD_CREATE", 2, guild_json(30, "nest"))?;
    wait_until(&mut states, "Ready", |s| *s == SessionState::Ready).await?;

    let shard = session.shard(0).expect("shard 0 running");
    within("GUILD_CREATE", async {
        while shard.sequence() != Some(2) {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await?;
    assert_eq!(session.cache().guild(Snowflake::new(30))?.name, "nest");

    session.close().await;
    Ok(())
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_resume_after_reconnect_request() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let mut resume_gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;
    let mut connects = watch_connects(&session);
    session.connect().await?;

    let mut first = gateway.accept().await?;
    first.hello(45_000)?;
    first.expect_op(OpCode::Identify).await?;
    first.dispatch("READY", 1, ready_json("S", &[], Some(&resume_gateway.url())))?;
    first.dispatch("GUILD_CREATE", 17, guild_json(20, "roost"))?;
    assert_eq!(within("connect event", connects.recv()).await?, Some(false));

    first.send(&GatewayFrame::reconnect())?;
    assert_eq!(first.expect_close().await?, Some(4000));

    // READY's resume URL wins over the configured one
    let mut second = resume_gateway.accept().await?;
    second.hello(45_000)?;
    let resume = second.expect_op(OpCode::Resume).await?;
    assert_eq!(resume.d["token"], "T");
    assert_eq!(resume.d["session_id"], "S");
    assert_eq!(resume.d["seq"], 17);

    // a replay of 17 is skipped
    second.dispatch("GUILD_CREATE", 17, guild_json(20, "replayed"))?;
    second.dispatch("GUILD_CREATE", 18, guild_json(21, "a"))?;
    second.dispatch("GUILD_CREATE", 19, guild_json(22, "b"))?;
    second.dispatch("GUILD_CREATE", 20, guild_json(23, "c"))?;
    second.send(&GatewayFrame {
        op: OpCode::Dispatch,
        d: json!({}),
        s: None,
        t: Some("RESUMED".to_string()),
    })?;
    assert_eq!(within("resumed event", connects.recv()).await?, Some(true));

    let shard = session.shard(0).expect("shard 0 running");
    assert_eq!(shard.sequence(), Some(20));
    assert_eq!(shard.session_id().as_deref(), Some("S"));
    assert_eq!(session.cache().guild(Snowflake::new(20))?.name, "roost");
    assert_eq!(session.cache().guild(Snowflake::new(23))?.name, "c");

    session.close().await;
    assert_eq!(second.expect_close().await?, Some(1000));
    Ok(())
}

// ============================================================================
// Zombie connections
// ============================================================================

#[tokio::test]
async fn test_zombie_connection_resumes() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;
    let (disconnect_tx, mut disconnects) = mpsc::unbounded_channel();
    session.on(move |_ctx, event: Disconnect| {
        let tx = disconnect_tx.clone();
        async move {
            let _ = tx.send((event.code, event.will_reconnect));
        }
    });

    session.connect().await?;
    let mut first = gateway.accept().await?;
    first.hello(200)?;
    first.expect_op(OpCode::Identify).await?;
    first.dispatch("READY", 1, ready_json("S", &[], None))?;

    // heartbeats go unacknowledged
    let close = first.expect_close().await?;
    assert_ne!(close, Some(1000));
    assert_eq!(close, Some(4000));
    assert_eq!(
        within("disconnect event", disconnects.recv()).await?,
        Some((Some(4000), true))
    );

    let mut second = gateway.accept().await?;
    second.hello(45_000)?;
    let resume = second.expect_op(OpCode::Resume).await?;
    assert_eq!(resume.d["session_id"], "S");
    assert_eq!(resume.d["seq"], 1);

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_acknowledged_heartbeats_keep_connection() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;

    session.connect().await?;
    let mut conn = gateway.accept().await?;
    conn.hello(100)?;
    conn.expect_op(OpCode::Identify).await?;
    conn.dispatch("READY", 1, ready_json("S", &[], None))?;

    for _ in 0..4 {
        let beat = conn.expect_op(OpCode::Heartbeat).await?;
        assert!(beat.d.is_null() || beat.d == 1);
        conn.heartbeat_ack()?;
    }
    let shard = session.shard(0).expect("shard 0 running");
    assert!(shard.latency().is_some());
    assert_eq!(shard.state(), SessionState::Ready);

    session.close().await;
    assert_eq!(conn.expect_close().await?, Some(1000));
    Ok(())
}

// ============================================================================
// Close codes
// ============================================================================

#[tokio::test]
async fn test_authentication_failure_is_fatal() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;

    session.connect().await?;
    let mut conn = gateway.accept().await?;
    conn.hello(45_000)?;
    conn.expect_op(OpCode::Identify).await?;
    conn.close(4004, "Authentication failed")?;

    let result = within("session to stop", session.run()).await?;
    assert!(matches!(
        result,
        Err(Error::Gateway(GatewayError::FatalClose { code: 4004, .. }))
    ));
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_session_timeout_identifies_again() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;

    session.connect().await?;
    let mut first = gateway.accept().await?;
    first.hello(45_000)?;
    first.expect_op(OpCode::Identify).await?;
    first.dispatch("READY", 1, ready_json("S", &[], None))?;
    first.close(4009, "Session timed out")?;

    // reconnects after backoff with a fresh IDENTIFY
    let mut second = gateway.accept().await?;
    second.hello(45_000)?;
    second.expect_op(OpCode::Identify).await?;
    assert_eq!(session.shard(0).and_then(|s| s.session_id()), None);

    session.close().await;
    Ok(())
}

// ============================================================================
// Gateway requests
// ============================================================================

async fn single_shard_session(gateway: &MockGateway) -> Result<(Session, MockRestServer)> {
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    Ok((Session::new(config)?, rest))
}

#[tokio::test]
async fn test_invalid_session_identifies_fresh() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (session, _rest) = single_shard_session(&gateway).await?;

    session.connect().await?;
    let mut first = gateway.accept().await?;
    first.hello(45_000)?;
    first.expect_op(OpCode::Identify).await?;
    first.dispatch("READY", 1, ready_json("S", &[], None))?;
    first.dispatch("GUILD_CREATE", 2, guild_json(20, "roost"))?;
    first.send(&GatewayFrame::invalid_session(false))?;
    assert_eq!(first.expect_close().await?, Some(4000));
    let closed = Instant::now();

    // the session is dropped before the 1-5 s wait
    let shard = session.shard(0).expect("shard 0 running");
    assert_eq!(shard.session_id(), None);

    let mut second = gateway.accept().await?;
    assert!(closed.elapsed() >= Duration::from_millis(900));
    second.hello(45_000)?;
    let identify = second.expect_op(OpCode::Identify).await?;
    assert_eq!(identify.d["token"], "T");
    assert_eq!(shard.sequence(), None);

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_resumable_invalid_session_resumes() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (session, _rest) = single_shard_session(&gateway).await?;

    session.connect().await?;
    let mut first = gateway.accept().await?;
    first.hello(45_000)?;
    first.expect_op(OpCode::Identify).await?;
    first.dispatch("READY", 1, ready_json("S", &[], None))?;
    first.dispatch("GUILD_CREATE", 5, guild_json(20, "roost"))?;
    first.send(&GatewayFrame::invalid_session(true))?;
    assert_eq!(first.expect_close().await?, Some(4000));
    let closed = Instant::now();

    let mut second = gateway.accept().await?;
    assert!(closed.elapsed() >= Duration::from_millis(400));
    second.hello(45_000)?;
    let resume = second.expect_op(OpCode::Resume).await?;
    assert_eq!(resume.d["session_id"], "S");
    assert_eq!(resume.d["seq"], 5);

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_heartbeat_request_answered_at_once() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (session, _rest) = single_shard_session(&gateway).await?;

    session.connect().await?;
    let mut conn = gateway.accept().await?;
    conn.hello(45_000)?;
    conn.expect_op(OpCode::Identify).await?;
    conn.dispatch("READY", 3, ready_json("S", &[], None))?;
    conn.send(&GatewayFrame::heartbeat(None))?;

    // the scheduled beat is up to 45 s away, so a beat carrying 3 is the reply
    let requested = Instant::now();
    within("requested heartbeat", async {
        loop {
            let beat = conn.expect_op(OpCode::Heartbeat).await?;
            if beat.d == 3 {
                return anyhow::Ok(());
            }
        }
    })
    .await??;
    assert!(requested.elapsed() < Duration::from_secs(5));

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_hello_reconnects() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (session, _rest) = single_shard_session(&gateway).await?;
    let (disconnect_tx, mut disconnects) = mpsc::unbounded_channel();
    session.on(move |_ctx, event: Disconnect| {
        let tx = disconnect_tx.clone();
        async move {
            let _ = tx.send(event.will_reconnect);
        }
    });

    session.connect().await?;
    let mut first = gateway.accept().await?;
    first.heartbeat_ack()?;
    assert_eq!(first.expect_close().await?, Some(4000));
    assert_eq!(within("disconnect event", disconnects.recv()).await?, Some(true));
    let closed = Instant::now();

    // backoff starts at 1 s with 20% jitter
    let mut second = gateway.accept().await?;
    assert!(closed.elapsed() >= Duration::from_millis(700));
    second.hello(45_000)?;
    second.expect_op(OpCode::Identify).await?;

    session.close().await;
    Ok(())
}

// ============================================================================
// Sharding
// ============================================================================

/// Guild ids land on shard `(id >> 22) % count`
const SHARD_0_GUILD: u64 = 2 << 22;
const SHARD_1_GUILD: u64 = 1 << 22;

#[tokio::test]
async fn test_each_shard_identifies_with_its_index() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(2)
        .build()?;
    let session = Session::new(config)?;
    let (guild_tx, mut guilds) = mpsc::unbounded_channel();
    session.on(move |ctx: Context, event: GuildCreate| {
        let tx = guild_tx.clone();
        async move {
            let shard = ctx.shard_id().map(|id| id.index);
            let _ = tx.send((shard, event.guild.id.get()));
        }
    });

    session.connect().await?;
    assert_eq!(session.shards().len(), 2);

    let mut seen = HashSet::new();
    let mut shard_zero = None;
    for _ in 0..2 {
        let mut conn = gateway.accept().await?;
        conn.hello(45_000)?;
        let identify = conn.expect_op(OpCode::Identify).await?;
        let shard = identify.d["shard"].clone();
        assert!(seen.insert(shard.to_string()), "duplicate identify for {shard}");
        if shard == json!([0, 2]) {
            shard_zero = Some(conn);
        }
    }
    assert_eq!(
        seen,
        HashSet::from([json!([0, 2]).to_string(), json!([1, 2]).to_string()])
    );
    assert!(rest.hits("/api/v10/gateway/bot").is_empty());

    let mut conn = shard_zero.expect("shard 0 identified");
    conn.dispatch("READY", 1, ready_json("S0", &[], None))?;
    conn.dispatch("GUILD_CREATE", 2, guild_json(SHARD_1_GUILD, "elsewhere"))?;
    conn.dispatch("GUILD_CREATE", 3, guild_json(SHARD_0_GUILD, "home"))?;

    // both are delivered; only the owned guild is cached
    let mut delivered = HashSet::new();
    for _ in 0..2 {
        let event = within("guild event", guilds.recv()).await?;
        delivered.insert(event.expect("handler running"));
    }
    assert_eq!(
        delivered,
        HashSet::from([(Some(0), SHARD_1_GUILD), (Some(0), SHARD_0_GUILD)])
    );
    assert_eq!(session.cache().guild(Snowflake::new(SHARD_0_GUILD))?.name, "home");
    assert!(session.cache().guild(Snowflake::new(SHARD_1_GUILD)).is_err());

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_second_connect_rejected() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let rest = MockRestServer::with_gateway_bot(&gateway.url(), 1).await?;
    let config = test_config(&rest)
        .gateway_url(gateway.url())
        .shard_count(1)
        .build()?;
    let session = Session::new(config)?;

    session.connect().await?;
    let _conn = gateway.accept().await?;
    assert!(matches!(
        session.connect().await,
        Err(Error::Gateway(GatewayError::AlreadyConnected))
    ));

    session.close().await;
    Ok(())
}
