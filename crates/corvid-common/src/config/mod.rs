//! Configuration

mod client_config;

pub use client_config::{ClientConfig, ClientConfigBuilder, ConfigError};
