//! # corvid-common
//!
//! Shared utilities: client configuration, the error taxonomy, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{Classify, ErrorKind};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
