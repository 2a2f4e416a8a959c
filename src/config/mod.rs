//! Configuration subsystem.
//!
//! # Responsibilities
//! - Define the server configuration schema (serde)
//! - Load and validate configuration from TOML files
//! - Fail fast: a malformed trusted-proxy entry rejects the whole config

pub mod loader;
pub mod schema;

pub use loader::load_config;
pub use schema::{ServerConfig, TlsConfig};

use thiserror::Error;

/// Configuration rejected at startup. Never retried automatically.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A trusted-proxy entry is not a valid IP address or CIDR range.
    #[error("invalid trusted proxy entry '{entry}': {reason}")]
    TrustedProxy { entry: String, reason: String },

    /// Certificate or private key could not be loaded.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for the schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
