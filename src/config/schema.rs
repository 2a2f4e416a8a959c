//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Port used when neither an address nor a default-port override is given.
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration.
///
/// The library never reads the process environment; a `PORT`-style override
/// belongs to the binary layer, which feeds it into `default_port`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Explicit bind address (e.g. "0.0.0.0:8080"). When absent, the
    /// server binds all interfaces on `default_port`.
    pub address: Option<String>,

    /// Port to use when no explicit address is configured.
    pub default_port: Option<u16>,

    /// CIDR ranges (or bare addresses) whose forwarded-for claims are
    /// trusted. Empty means the socket peer is always the client.
    pub trusted_proxies: Vec<String>,

    /// Optional TLS certificate/key pair.
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    /// The address the plain-TCP entry point should bind.
    pub fn bind_address(&self) -> String {
        match &self.address {
            Some(addr) => addr.clone(),
            None => format!("0.0.0.0:{}", self.default_port.unwrap_or(DEFAULT_PORT)),
        }
    }
}

/// TLS configuration for a listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}
