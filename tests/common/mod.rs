//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use trellis::Engine;

/// Start `engine` on an ephemeral local port, serving in the background.
///
/// The port is bound before this returns, so requests sent immediately
/// afterwards queue in the kernel until the accept loop catches up.
#[allow(dead_code)]
pub fn start_engine(engine: Arc<Engine>) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = engine.run_listener(listener).await;
    });
    addr
}

/// Reserve an ephemeral local address for an entry point that binds by
/// address string. The probe listener is dropped on return; the OS keeps
/// just-released ephemeral ports out of rotation long enough for the
/// caller to rebind them.
#[allow(dead_code)]
pub fn reserve_local_addr() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

/// Wait until `addr` accepts connections, for entry points that bind a
/// fixed address in the background.
#[allow(dead_code)]
pub async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{addr} never started listening");
}

/// Send a raw request string and return (status, body).
#[allow(dead_code)]
pub async fn send_raw(addr: SocketAddr, raw: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    parse_response(std::str::from_utf8(&response).unwrap())
}

#[allow(dead_code)]
pub async fn get(addr: SocketAddr, path: &str) -> (u16, String) {
    send_raw(
        addr,
        &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
    )
    .await
}

#[allow(dead_code)]
pub async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    send_raw(
        addr,
        &format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
    )
    .await
}

#[allow(dead_code)]
pub async fn get_with_header(
    addr: SocketAddr,
    path: &str,
    name: &str,
    value: &str,
) -> (u16, String) {
    send_raw(
        addr,
        &format!(
            "GET {path} HTTP/1.1\r\nHost: localhost\r\n{name}: {value}\r\nConnection: close\r\n\r\n"
        ),
    )
    .await
}

/// Parse status and body out of a full HTTP/1.1 response.
#[allow(dead_code)]
pub fn parse_response(raw: &str) -> (u16, String) {
    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("malformed response: {raw:?}"));
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}
