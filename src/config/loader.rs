//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::ConfigError;
use crate::net::trusted::TrustedProxies;

/// Load and validate configuration from a TOML file.
///
/// Trusted-proxy entries are validated here, once; serving never re-parses
/// them.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;

    TrustedProxies::parse(&config.trusted_proxies)?;

    Ok(config)
}
