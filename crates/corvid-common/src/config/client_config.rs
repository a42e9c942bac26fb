//! Client configuration
//!
//! Built programmatically with [`ClientConfig::builder`] or loaded from
//! `CORVID_*` environment variables.

use corvid_core::Intents;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::telemetry::TracingConfig;

/// Options recognised by the client core
#[derive(Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_shards"))]
pub struct ClientConfig {
    /// Bot token, sent as `Authorization: Bot <token>`
    #[validate(length(min = 1, message = "token must not be empty"))]
    pub token: String,

    #[serde(default = "default_intents")]
    pub intents: Intents,

    /// Run only this shard; all shards of `shard_count` when unset
    #[serde(default)]
    pub shard_index: Option<u32>,

    /// Total shards; the gateway's recommendation when unset
    #[serde(default)]
    pub shard_count: Option<u32>,

    /// Message ring size per channel (0 disables message caching)
    #[serde(default)]
    pub max_messages_per_channel: usize,

    /// Request zlib-stream transport compression
    #[serde(default)]
    pub compress: bool,

    #[serde(default = "default_large_threshold")]
    #[validate(range(min = 50, max = 250, message = "large_threshold must be 50-250"))]
    pub large_threshold: u32,

    /// Reconnect after fatal close codes that are not authentication failures
    #[serde(default)]
    pub reconnect_on_error: bool,

    /// Hex-encoded Ed25519 key for the interaction ingress
    #[serde(default)]
    #[validate(length(equal = 64, message = "public_key must be 32 bytes of hex"))]
    pub public_key: Option<String>,

    #[serde(default = "default_api_base_url")]
    #[validate(length(min = 1))]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: u8,

    #[serde(default = "default_api_version")]
    pub gateway_version: u8,

    /// Skip gateway discovery and connect here
    #[serde(default)]
    pub gateway_url: Option<String>,

    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Follows the GUILD_PRESENCES intent when unset
    #[serde(default)]
    pub track_presences: Option<bool>,

    #[serde(default = "default_true")]
    pub track_voice_states: bool,

    #[serde(default = "default_handler_shutdown_timeout_ms")]
    pub handler_shutdown_timeout_ms: u64,

    /// Reported as `browser` and `device` in IDENTIFY
    #[serde(default = "default_client_name")]
    pub client_name: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

fn default_intents() -> Intents {
    Intents::non_privileged()
}

fn default_large_threshold() -> u32 {
    50
}

fn default_api_base_url() -> String {
    "https://discord.com/api".to_string()
}

fn default_api_version() -> u8 {
    10
}

fn default_http_timeout_ms() -> u64 {
    15_000
}

fn default_true() -> bool {
    true
}

fn default_handler_shutdown_timeout_ms() -> u64 {
    5_000
}

fn default_client_name() -> String {
    "corvid".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn validate_shards(config: &ClientConfig) -> Result<(), ValidationError> {
    match (config.shard_index, config.shard_count) {
        (_, Some(0)) => Err(ValidationError::new("shard_count_zero")
            .with_message("shard_count must be at least 1".into())),
        (Some(index), Some(count)) if index >= count => {
            Err(ValidationError::new("shard_index_out_of_range")
                .with_message("shard_index must be below shard_count".into()))
        }
        (Some(_), None) => Err(ValidationError::new("shard_count_required")
            .with_message("shard_index requires an explicit shard_count".into())),
        _ => Ok(()),
    }
}

impl ClientConfig {
    /// Start building a configuration around `token`
    pub fn builder(token: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(token)
    }

    /// Load configuration from environment variables
    ///
    /// Reads a `.env` file first if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("CORVID_TOKEN").ok_or(ConfigError::MissingVar("CORVID_TOKEN"))?;
        let mut builder = Self::builder(token);

        if let Some(bits) = parse_var::<u64, _>(&lookup, "CORVID_INTENTS")? {
            builder = builder.intents(Intents::from_bits_truncate(bits));
        }
        if let Some(count) = parse_var(&lookup, "CORVID_SHARD_COUNT")? {
            builder = builder.shard_count(count);
        }
        if let Some(index) = parse_var(&lookup, "CORVID_SHARD_INDEX")? {
            builder.config.shard_index = Some(index);
        }
        if let Some(max) = parse_var(&lookup, "CORVID_MAX_MESSAGES")? {
            builder = builder.max_messages_per_channel(max);
        }
        if let Some(compress) = parse_var(&lookup, "CORVID_COMPRESS")? {
            builder = builder.compress(compress);
        }
        if let Some(threshold) = parse_var(&lookup, "CORVID_LARGE_THRESHOLD")? {
            builder = builder.large_threshold(threshold);
        }
        if let Some(reconnect) = parse_var(&lookup, "CORVID_RECONNECT_ON_ERROR")? {
            builder = builder.reconnect_on_error(reconnect);
        }
        if let Some(key) = lookup("CORVID_PUBLIC_KEY") {
            builder = builder.public_key(key);
        }
        if let Some(url) = lookup("CORVID_API_BASE_URL") {
            builder = builder.api_base_url(url);
        }
        if let Some(url) = lookup("CORVID_GATEWAY_URL") {
            builder = builder.gateway_url(url);
        }
        if let Some(timeout) = parse_var(&lookup, "CORVID_HTTP_TIMEOUT_MS")? {
            builder.config.http_timeout_ms = timeout;
        }
        if let Some(level) = lookup("CORVID_LOG_LEVEL") {
            builder.config.log_level = level;
        }
        if let Some(json) = parse_var(&lookup, "CORVID_LOG_JSON")? {
            builder.config.log_json = json;
        }

        builder.build()
    }

    /// Check field and cross-field rules
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate().map_err(ConfigError::Validation)?;
        self.log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidValue("log_level", self.log_level.clone()))?;
        Ok(())
    }

    /// REST base including the version segment, e.g. `https://host/api/v10`
    pub fn api_url(&self) -> String {
        format!("{}/v{}", self.api_base_url.trim_end_matches('/'), self.api_version)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn handler_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_shutdown_timeout_ms)
    }

    /// Whether presences are cached
    pub fn tracks_presences(&self) -> bool {
        self.track_presences
            .unwrap_or_else(|| self.intents.contains(Intents::GUILD_PRESENCES))
    }

    /// Tracing settings derived from `log_level` and `log_json`
    pub fn tracing_config(&self) -> TracingConfig {
        let base = if self.log_json {
            TracingConfig::production()
        } else {
            TracingConfig::default()
        };
        TracingConfig {
            level: self.log_level.parse().unwrap_or(Level::INFO),
            ..base
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("shard_index", &self.shard_index)
            .field("shard_count", &self.shard_count)
            .field("max_messages_per_channel", &self.max_messages_per_channel)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .field("reconnect_on_error", &self.reconnect_on_error)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .field("gateway_url", &self.gateway_url)
            .finish_non_exhaustive()
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new(token: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                token: token.into(),
                intents: default_intents(),
                shard_index: None,
                shard_count: None,
                max_messages_per_channel: 0,
                compress: false,
                large_threshold: default_large_threshold(),
                reconnect_on_error: false,
                public_key: None,
                api_base_url: default_api_base_url(),
                api_version: default_api_version(),
                gateway_version: default_api_version(),
                gateway_url: None,
                http_timeout_ms: default_http_timeout_ms(),
                track_presences: None,
                track_voice_states: true,
                handler_shutdown_timeout_ms: default_handler_shutdown_timeout_ms(),
                client_name: default_client_name(),
                log_level: default_log_level(),
                log_json: false,
            },
        }
    }

    pub fn intents(mut self, intents: Intents) -> Self {
        self.config.intents = intents;
        self
    }

    /// Run every shard of `count`
    pub fn shard_count(mut self, count: u32) -> Self {
        self.config.shard_count = Some(count);
        self
    }

    /// Run only shard `index` of `count`
    pub fn shard(mut self, index: u32, count: u32) -> Self {
        self.config.shard_index = Some(index);
        self.config.shard_count = Some(count);
        self
    }

    pub fn max_messages_per_channel(mut self, max: usize) -> Self {
        self.config.max_messages_per_channel = max;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.config.compress = compress;
        self
    }

    pub fn large_threshold(mut self, threshold: u32) -> Self {
        self.config.large_threshold = threshold;
        self
    }

    pub fn reconnect_on_error(mut self, reconnect: bool) -> Self {
        self.config.reconnect_on_error = reconnect;
        self
    }

    pub fn public_key(mut self, key: impl Into<String>) -> Self {
        self.config.public_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway_url = Some(url.into());
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn track_presences(mut self, track: bool) -> Self {
        self.config.track_presences = Some(track);
        self
    }

    pub fn track_voice_states(mut self, track: bool) -> Self {
        self.config.track_voice_states = track;
        self
    }

    pub fn handler_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.handler_shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate_config()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}
