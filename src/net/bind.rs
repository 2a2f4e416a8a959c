//! Transport binding and the shared accept loop.
//!
//! # Responsibilities
//! - Create or adopt a listener for each of the five transport kinds
//! - Accept connections and spawn one task per connection
//! - Terminate pending accepts on shutdown instead of hanging
//!
//! # Design Decisions
//! - Every binding converges on [`serve`], so startup and failure semantics
//!   are identical across transports
//! - Adopted descriptors/listeners are probed (`local_addr`) up front; a
//!   dead listener is rejected before the accept loop starts
//! - A failed TLS handshake ends that connection only, never the listener

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

#[cfg(unix)]
use tokio::net::UnixListener;

use crate::config::ConfigError;
use crate::http::server::{serve_connection, Dispatcher};

/// A listener mechanism that turned out to be unusable.
///
/// Fatal to the bind attempt that produced it, and to nothing else: route
/// tree and trusted-proxy state shared with other bindings stay untouched.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Startup configuration was rejected before binding.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to bind or resolve a TCP address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The Unix socket path could not be bound.
    #[error("unix socket {} unusable: {source}", path.display())]
    UnixSocket {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The inherited file descriptor is not a listening TCP socket.
    #[cfg(unix)]
    #[error("file descriptor {fd} is not a listening socket: {source}")]
    BadDescriptor {
        fd: std::os::fd::RawFd,
        source: std::io::Error,
    },

    /// The supplied listener is closed or otherwise unusable.
    #[error("supplied listener is unusable: {0}")]
    ClosedListener(std::io::Error),

    /// The accept loop failed.
    #[error("accept failed: {0}")]
    Accept(std::io::Error),
}

/// One concrete listening mechanism, ready to accept.
pub(crate) enum Acceptor {
    Plain(TcpListener),
    Tls(TcpListener, TlsAcceptor),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Resolve `addr` and create a fresh TCP listener. Address-in-use and
/// resolution failures surface immediately; the call never hangs.
pub(crate) async fn bind_tcp(addr: &str) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Adopt an already-open std TCP listener. `local_addr` doubles as a probe:
/// closed or non-listening descriptors fail it.
pub(crate) fn adopt_std(listener: std::net::TcpListener) -> Result<TcpListener, std::io::Error> {
    listener.local_addr()?;
    listener.set_nonblocking(true)?;
    TcpListener::from_std(listener)
}

/// Bind a Unix domain socket, clearing a dead socket file left behind by a
/// previous run. A socket file with a live listener behind it is never
/// replaced; rebinding it fails with address-in-use.
#[cfg(unix)]
pub(crate) fn bind_unix(path: &Path) -> Result<UnixListener, TransportError> {
    use std::os::unix::fs::FileTypeExt;

    let unusable = |source| TransportError::UnixSocket {
        path: path.to_path_buf(),
        source,
    };

    if let Ok(metadata) = std::fs::metadata(path) {
        if metadata.file_type().is_socket() {
            // A connectable socket still has a listener serving it; only a
            // leftover nothing answers on may be cleared.
            if std::os::unix::net::UnixStream::connect(path).is_ok() {
                return Err(unusable(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    "socket is in use by a live listener",
                )));
            }
            std::fs::remove_file(path).map_err(unusable)?;
        }
    }
    UnixListener::bind(path).map_err(unusable)
}

/// Accept connections until shutdown, spawning one task per connection.
///
/// Returns `Ok(())` on orderly shutdown; an accept failure terminates the
/// loop with an error rather than leaving callers hanging. In-flight
/// connections run to completion either way.
pub(crate) async fn serve(
    acceptor: Acceptor,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), TransportError> {
    match acceptor {
        Acceptor::Plain(listener) => loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(TransportError::Accept)?;
                    tracing::trace!(peer = %peer, "connection accepted");
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(serve_connection(stream, dispatcher, Some(peer.ip())));
                }
                _ = shutdown.recv() => {
                    tracing::info!("listener shutting down");
                    return Ok(());
                }
            }
        },
        Acceptor::Tls(listener, tls) => loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(TransportError::Accept)?;
                    let tls = tls.clone();
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        match tls.accept(stream).await {
                            Ok(tls_stream) => {
                                tracing::trace!(peer = %peer, "TLS handshake complete");
                                serve_connection(tls_stream, dispatcher, Some(peer.ip())).await;
                            }
                            Err(err) => {
                                tracing::warn!(peer = %peer, error = %err, "TLS handshake failed");
                            }
                        }
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("TLS listener shutting down");
                    return Ok(());
                }
            }
        },
        #[cfg(unix)]
        Acceptor::Unix(listener) => loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted.map_err(TransportError::Accept)?;
                    tracing::trace!("unix connection accepted");
                    let dispatcher = dispatcher.clone();
                    // Unix peers have no IP address; trusted-proxy
                    // resolution is skipped for them.
                    tokio::spawn(serve_connection(stream, dispatcher, None));
                }
                _ = shutdown.recv() => {
                    tracing::info!("unix listener shutting down");
                    return Ok(());
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_tcp_rejects_garbage_addresses() {
        let err = bind_tcp("not a socket address").await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[tokio::test]
    async fn second_bind_to_the_same_address_fails() {
        let first = bind_tcp("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let err = bind_tcp(&addr).await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn bad_unix_path_is_a_transport_error() {
        let err = bind_unix(Path::new("/nonexistent-dir/trellis.sock")).unwrap_err();
        assert!(matches!(err, TransportError::UnixSocket { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dead_socket_file_is_replaced() {
        let dir = std::env::temp_dir().join("trellis-stale-sock-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stale.sock");
        let _ = std::fs::remove_file(&path);

        // Dropping the listener leaves the socket file behind with nothing
        // serving it; a rebind must clear the dead file.
        drop(bind_unix(&path).unwrap());
        bind_unix(&path).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn live_socket_is_not_replaced() {
        let dir = std::env::temp_dir().join("trellis-live-sock-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("live.sock");
        let _ = std::fs::remove_file(&path);

        let _listener = bind_unix(&path).unwrap();
        let err = bind_unix(&path).unwrap_err();
        assert!(matches!(
            &err,
            TransportError::UnixSocket { source, .. }
                if source.kind() == std::io::ErrorKind::AddrInUse
        ));
        let _ = std::fs::remove_file(&path);
    }
}
