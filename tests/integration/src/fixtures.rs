//! Test fixtures and payload generators

use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

/// Fixed application key for signed interaction tests
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// Hex public key matching [`signing_key`], as configured on a session
pub fn public_key_hex() -> String {
    hex::encode(signing_key().verifying_key().to_bytes())
}

/// Hex signature over `timestamp || body`
pub fn sign(timestamp: &str, body: &[u8]) -> String {
    let mut message = timestamp.as_bytes().to_vec();
    message.extend_from_slice(body);
    hex::encode(signing_key().sign(&message).to_bytes())
}

pub fn user_json(id: u64, username: &str) -> Value {
    json!({"id": id.to_string(), "username": username, "bot": true})
}

/// READY with the given unavailable guilds
pub fn ready_json(session_id: &str, guild_ids: &[u64], resume_url: Option<&str>) -> Value {
    let guilds: Vec<Value> = guild_ids
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    let mut ready = json!({
        "v": 10,
        "user": user_json(1, "corvid"),
        "guilds": guilds,
        "session_id": session_id,
        "application": {"id": "1"}
    });
    if let Some(url) = resume_url {
        ready["resume_gateway_url"] = json!(url);
    }
    ready
}

pub fn guild_json(id: u64, name: &str) -> Value {
    json!({"id": id.to_string(), "name": name, "owner_id": "1"})
}

pub fn message_json(id: u64, channel_id: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "author": user_json(1, "corvid"),
        "content": content,
        "timestamp": "2024-01-01T00:00:00+00:00"
    })
}

/// Application command interaction `/caw`
pub fn command_interaction_json(id: u64) -> Value {
    json!({
        "id": id.to_string(),
        "application_id": "1",
        "type": 2,
        "token": "interaction-token",
        "version": 1,
        "channel_id": "5",
        "data": {"id": "77", "name": "caw", "type": 1}
    })
}

pub fn ping_interaction_json() -> Value {
    json!({
        "id": "1",
        "application_id": "1",
        "type": 1,
        "token": "ping-token",
        "version": 1
    })
}
