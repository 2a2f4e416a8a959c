//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::TlsAcceptor;

use crate::config::ConfigError;

// Installed once for the whole process; binding several TLS listeners must
// not race on the provider.
static CRYPTO_PROVIDER_INIT: std::sync::Once = std::sync::Once::new();

fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}

/// Build a TLS acceptor from a PEM certificate/key pair.
///
/// A missing file, an unparseable PEM, or a mismatched pair is a
/// configuration error that fails the bind attempt before any connection is
/// accepted.
pub fn build_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ConfigError> {
    ensure_crypto_provider();

    if !cert_path.exists() {
        return Err(ConfigError::Tls(format!(
            "certificate file not found: {}",
            cert_path.display()
        )));
    }
    if !key_path.exists() {
        return Err(ConfigError::Tls(format!(
            "private key file not found: {}",
            key_path.display()
        )));
    }

    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ConfigError::Tls(format!("invalid certificate/key pair: {e}")))?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, ConfigError> {
    let file = File::open(path)
        .map_err(|e| ConfigError::Tls(format!("failed to open certificate file: {e}")))?;
    let mut reader = BufReader::new(file);

    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| ConfigError::Tls(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(ConfigError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<rustls::pki_types::PrivateKeyDer<'static>, ConfigError> {
    let file = File::open(path)
        .map_err(|e| ConfigError::Tls(format!("failed to open key file: {e}")))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ConfigError::Tls(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ConfigError::Tls(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_config_errors() {
        let err = build_acceptor(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::Tls(_)));
    }
}
