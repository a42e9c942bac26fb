//! REST endpoints used by the client core

use corvid_core::{Component, FileUpload, InteractionResponse, Message, Snowflake, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http_client::HttpClient;
use super::request::Request;
use crate::error::HttpError;

/// `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

/// Body of `POST /channels/{id}/messages`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<Value>,
    #[serde(skip)]
    pub files: Vec<FileUpload>,
}

impl CreateMessage {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }

    /// JSON payload with attachment metadata for each file
    pub fn payload_json(&self) -> Result<Value, HttpError> {
        let mut payload = serde_json::to_value(self)?;
        if !self.files.is_empty() {
            let attachments: Vec<Value> = self
                .files
                .iter()
                .enumerate()
                .map(|(i, f)| serde_json::json!({ "id": i, "filename": f.filename }))
                .collect();
            payload["attachments"] = Value::Array(attachments);
        }
        Ok(payload)
    }
}

impl HttpClient {
    pub async fn get_gateway_bot(&self) -> Result<GatewayBot, HttpError> {
        self.request(Request::get("/gateway/bot")).await?.json()
    }

    pub async fn get_current_user(&self) -> Result<User, HttpError> {
        self.request(Request::get("/users/@me")).await?.json()
    }

    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        message: CreateMessage,
    ) -> Result<Message, HttpError> {
        let payload = message.payload_json()?;
        let request = Request::post(format!("/channels/{channel_id}/messages"))
            .with_files(payload, message.files);
        self.request(request).await?.json()
    }

    pub async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), HttpError> {
        let mut request = Request::delete(format!("/channels/{channel_id}/messages/{message_id}"));
        if let Some(reason) = reason {
            request = request.reason(reason);
        }
        self.request(request).await?;
        Ok(())
    }

    /// `POST /interactions/{id}/{token}/callback`
    pub async fn create_interaction_response(
        &self,
        interaction_id: Snowflake,
        token: &str,
        response: &InteractionResponse,
    ) -> Result<(), HttpError> {
        let payload = response.payload_json()?;
        let request = Request::post(format!("/interactions/{interaction_id}/{token}/callback"))
            .with_files(payload, response.files.clone());
        self.request(request).await?;
        Ok(())
    }
}
