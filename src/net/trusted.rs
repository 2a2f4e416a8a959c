//! Trusted-proxy resolution.
//!
//! # Responsibilities
//! - Parse the configured CIDR ranges once, at startup
//! - Decide, per connection, which hop of a forwarded-for chain is the
//!   genuine client
//!
//! # Design Decisions
//! - Any malformed CIDR entry is a hard configuration failure detected at
//!   setup, never re-parsed at request time
//! - An untrusted socket peer short-circuits to itself: a direct client can
//!   never spoof its address with a forged header
//! - The parsed set is immutable during serving, so resolution takes no lock

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::config::ConfigError;

/// Set of CIDR ranges whose forwarded-for claims may be trusted.
///
/// The default (empty) set trusts nothing: the socket peer is always
/// reported as the client.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    networks: Vec<IpNetwork>,
}

impl TrustedProxies {
    /// Parse configured entries, each either a CIDR range ("10.0.0.0/8")
    /// or a bare address ("192.168.1.1", implying a full-length prefix).
    /// IPv4 and IPv6 may be mixed. The first malformed entry fails the
    /// whole set.
    pub fn parse(entries: &[String]) -> Result<Self, ConfigError> {
        let mut networks = Vec::with_capacity(entries.len());
        for entry in entries {
            networks.push(parse_entry(entry)?);
        }
        Ok(Self { networks })
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(ip))
    }

    /// Resolve the real client address.
    ///
    /// `forwarded_for` is the X-Forwarded-For value with the nearest hop
    /// last, as appended by each proxy. Starting from the socket peer, each
    /// trusted hop yields to the next address in the chain; the first
    /// untrusted address (or the far end of the chain) is the client. A
    /// malformed entry aborts the walk and falls back to the peer.
    pub fn resolve(&self, peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
        if self.networks.is_empty() || !self.is_trusted(peer) {
            return peer;
        }
        let Some(header) = forwarded_for else {
            return peer;
        };

        let mut client = peer;
        for entry in header.split(',').rev() {
            let entry = entry.trim();
            if entry.is_empty() {
                return peer;
            }
            let Ok(ip) = entry.parse::<IpAddr>() else {
                return peer;
            };
            client = ip;
            if !self.is_trusted(ip) {
                break;
            }
        }
        client
    }
}

fn parse_entry(entry: &str) -> Result<IpNetwork, ConfigError> {
    let invalid = |reason: String| ConfigError::TrustedProxy {
        entry: entry.to_string(),
        reason,
    };

    if entry.contains('/') {
        entry.parse::<IpNetwork>().map_err(|e| invalid(e.to_string()))
    } else {
        let ip: IpAddr = entry.parse().map_err(|_| invalid("not an IP address".to_string()))?;
        let prefix = match ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        IpNetwork::new(ip, prefix).map_err(|e| invalid(e.to_string()))
    }
}
