//! Signed interaction ingress tests
//!
//! Run with: cargo test -p integration-tests --test interaction_tests

use anyhow::Result;
use corvid_core::events::InteractionCreate;
use corvid_gateway::{Context, InteractionResponse, Session};
use corvid_interactions::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use ed25519_dalek::Signer;
use integration_tests::{
    command_interaction_json, ping_interaction_json, public_key_hex, serve, sign, signing_key,
    test_config, MockRestServer,
};
use reqwest::StatusCode;
use serde_json::Value;

const TIMESTAMP: &str = "1700000000";

// ============================================================================
// Signature verification
// ============================================================================

#[test]
fn test_valid_signature_verifies() -> Result<()> {
    let verifier = SignatureVerifier::from_hex(&public_key_hex())?;
    let body = br#"{"type":1}"#;
    assert!(verifier.verify(TIMESTAMP, body, &sign(TIMESTAMP, body)));
    Ok(())
}

#[test]
fn test_any_flipped_byte_fails() -> Result<()> {
    let verifier = SignatureVerifier::from_hex(&public_key_hex())?;
    let body = br#"{"id":"1","type":1}"#.to_vec();
    let mut message = TIMESTAMP.as_bytes().to_vec();
    message.extend_from_slice(&body);
    let signature = signing_key().sign(&message).to_bytes();

    for i in 0..body.len() {
        let mut tampered = body.clone();
        tampered[i] ^= 0x01;
        assert!(
            !verifier.verify(TIMESTAMP, &tampered, &hex::encode(signature)),
            "body byte {i}"
        );
    }

    for i in 0..TIMESTAMP.len() {
        let mut tampered = TIMESTAMP.as_bytes().to_vec();
        // stays ASCII
        tampered[i] ^= 0x01;
        let tampered = String::from_utf8(tampered)?;
        assert!(
            !verifier.verify(&tampered, &body, &hex::encode(signature)),
            "timestamp byte {i}"
        );
    }

    for i in 0..signature.len() {
        let mut tampered = signature;
        tampered[i] ^= 0x01;
        assert!(
            !verifier.verify(TIMESTAMP, &body, &hex::encode(tampered)),
            "signature byte {i}"
        );
    }
    Ok(())
}

// ============================================================================
// Ingress through a session
// ============================================================================

/// Session whose handlers answer `/caw`, served on an ephemeral port
async fn ingress() -> Result<(Session, String, MockRestServer)> {
    let rest = MockRestServer::start(axum::Router::new()).await?;
    let config = test_config(&rest).public_key(public_key_hex()).build()?;
    let session = Session::new(config)?;
    session.on(|ctx: Context, event: InteractionCreate| async move {
        let _ = ctx.respond(&event, InteractionResponse::message("caw!")).await;
    });

    let (addr, _) = serve(session.interactions_router()?).await?;
    Ok((session, format!("http://{addr}/interactions"), rest))
}

async fn post_signed(url: &str, body: &Value, signature: Option<String>) -> Result<reqwest::Response> {
    let body = serde_json::to_vec(body)?;
    let signature = signature.unwrap_or_else(|| sign(TIMESTAMP, &body));
    Ok(reqwest::Client::new()
        .post(url)
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, TIMESTAMP)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await?)
}

#[tokio::test]
async fn test_ping_answered_with_pong() -> Result<()> {
    let (_session, url, _rest) = ingress().await?;

    let response = post_signed(&url, &ping_interaction_json(), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["type"], 1);
    Ok(())
}

#[tokio::test]
async fn test_command_answered_by_handler() -> Result<()> {
    let (_session, url, rest) = ingress().await?;

    let response = post_signed(&url, &command_interaction_json(900), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["type"], 4);
    assert_eq!(body["data"]["content"], "caw!");
    // answered on the pending request, not through the REST callback
    assert!(rest.all_hits().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_bad_signature_rejected() -> Result<()> {
    let (_session, url, _rest) = ingress().await?;

    let forged = hex::encode([0u8; 64]);
    let response = post_signed(&url, &command_interaction_json(901), Some(forged)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
