//! Axum router for `POST /interactions`

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use corvid_core::events::InteractionCreate;
use corvid_core::{Interaction, InteractionResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::IngressError;
use crate::multipart::MultipartBody;
use crate::responder::CallbackResponder;
use crate::verify::SignatureVerifier;
use crate::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Receives verified, non-PING interactions
pub trait InteractionSink: Send + Sync + 'static {
    fn deliver(&self, event: InteractionCreate);
}

impl InteractionSink for mpsc::UnboundedSender<InteractionCreate> {
    fn deliver(&self, event: InteractionCreate) {
        if self.send(event).is_err() {
            warn!("Interaction sink closed; dropping interaction");
        }
    }
}

/// Response timing for the ingress
#[derive(Debug, Clone, Copy)]
pub struct IngressConfig {
    /// How long handlers have to call `respond`
    pub respond_window: Duration,
    /// When the pending request gives up with 408
    pub request_timeout: Duration,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            respond_window: Duration::from_secs(3),
            request_timeout: Duration::from_secs(4),
        }
    }
}

#[derive(Clone)]
pub struct IngressState {
    verifier: Arc<SignatureVerifier>,
    sink: Arc<dyn InteractionSink>,
    config: IngressConfig,
}

impl IngressState {
    pub fn new(verifier: SignatureVerifier, sink: Arc<dyn InteractionSink>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            sink,
            config: IngressConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: IngressConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IngressConfig {
        &self.config
    }
}

impl std::fmt::Debug for IngressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressState")
            .field("verifier", &self.verifier)
            .field("sink", &"InteractionSink")
            .field("config", &self.config)
            .finish()
    }
}

/// Router serving `POST /interactions`
pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/interactions", post(handle_interaction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, IngressError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(IngressError::MissingHeader(name))
}

/// Verify, decode, then answer PING inline or wait on the handlers
async fn handle_interaction(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, IngressError> {
    let signature = header_str(&headers, SIGNATURE_HEADER)?;
    let timestamp = header_str(&headers, TIMESTAMP_HEADER)?;
    if !state.verifier.verify(timestamp, &body, signature) {
        return Err(IngressError::InvalidSignature);
    }

    let interaction: Interaction = serde_json::from_slice(&body)?;
    if interaction.is_ping() {
        debug!(id = %interaction.id, "Answering interaction PING");
        return Ok(Json(InteractionResponse::pong()).into_response());
    }

    let id = interaction.id;
    let (responder, rx) = CallbackResponder::new(state.config.respond_window);
    state
        .sink
        .deliver(InteractionCreate::new(interaction).with_responder(Arc::new(responder)));

    match tokio::time::timeout(state.config.request_timeout, rx).await {
        Ok(Ok(response)) => encode_response(&response),
        Ok(Err(_)) => {
            warn!(id = %id, "Interaction handlers finished without responding");
            Err(IngressError::Timeout)
        }
        Err(_) => {
            warn!(id = %id, "Interaction response deadline expired");
            Err(IngressError::Timeout)
        }
    }
}

fn encode_response(response: &InteractionResponse) -> Result<Response, IngressError> {
    let payload = response.payload_json().map_err(IngressError::Encode)?;
    if !response.has_files() {
        return Ok(Json(payload).into_response());
    }

    let multipart = MultipartBody::encode(&payload, &response.files).map_err(IngressError::Encode)?;
    let content_type = multipart.content_type();
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        multipart.into_body(),
    )
        .into_response())
}
