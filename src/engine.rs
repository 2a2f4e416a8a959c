//! Engine: route registration façade and transport entry points.
//!
//! # Responsibilities
//! - Own the canonical route tree and publish read-only snapshots
//! - Carry the configured trusted-proxy entries until startup validates them
//! - Expose one entry point per transport binding, all with identical
//!   startup semantics
//!
//! # Design Decisions
//! - Registration mutates a canonical tree under a mutex and publishes a
//!   complete snapshot through an atomic swap; the request hot path reads
//!   without locks and can never observe a half-inserted node
//! - Trusted-proxy configuration is validated at the top of every `run_*`
//!   entry point, before anything binds; address-spoofing protection is
//!   never silently skipped

use std::path::Path;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use hyper::Method;

use crate::config::ServerConfig;
use crate::http::handler::HandlerChain;
use crate::http::server::Dispatcher;
use crate::lifecycle::Shutdown;
use crate::net::bind::{adopt_std, bind_tcp, serve, Acceptor, TransportError};
use crate::net::tls::build_acceptor;
use crate::net::trusted::TrustedProxies;
use crate::routing::{RegistrationError, Router};

/// One handler graph, exposable over multiple transport bindings.
pub struct Engine {
    registry: Mutex<Router>,
    snapshot: Arc<ArcSwap<Router>>,
    trusted_cidrs: Mutex<Vec<String>>,
    shutdown: Shutdown,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Router::new()),
            snapshot: Arc::new(ArcSwap::from_pointee(Router::new())),
            trusted_cidrs: Mutex::new(Vec::new()),
            shutdown: Shutdown::new(),
        }
    }

    /// Register `chain` for `method` at `pattern`.
    ///
    /// Safe to call at any time, including while serving: requests keep
    /// reading the previous snapshot until the new one is published whole.
    pub fn register(
        &self,
        method: Method,
        pattern: &str,
        chain: HandlerChain,
    ) -> Result<(), RegistrationError> {
        let mut registry = self.registry.lock().expect("route registry lock poisoned");
        registry.register(method, pattern, chain)?;
        self.snapshot.store(Arc::new(registry.clone()));
        Ok(())
    }

    pub fn get(&self, pattern: &str, chain: HandlerChain) -> Result<(), RegistrationError> {
        self.register(Method::GET, pattern, chain)
    }

    pub fn post(&self, pattern: &str, chain: HandlerChain) -> Result<(), RegistrationError> {
        self.register(Method::POST, pattern, chain)
    }

    pub fn put(&self, pattern: &str, chain: HandlerChain) -> Result<(), RegistrationError> {
        self.register(Method::PUT, pattern, chain)
    }

    pub fn delete(&self, pattern: &str, chain: HandlerChain) -> Result<(), RegistrationError> {
        self.register(Method::DELETE, pattern, chain)
    }

    pub fn patch(&self, pattern: &str, chain: HandlerChain) -> Result<(), RegistrationError> {
        self.register(Method::PATCH, pattern, chain)
    }

    pub fn head(&self, pattern: &str, chain: HandlerChain) -> Result<(), RegistrationError> {
        self.register(Method::HEAD, pattern, chain)
    }

    /// Install the fallback chain invoked when no route matches.
    pub fn no_route(&self, chain: HandlerChain) {
        let mut registry = self.registry.lock().expect("route registry lock poisoned");
        registry.set_no_route(chain);
        self.snapshot.store(Arc::new(registry.clone()));
    }

    /// Replace the trusted-proxy entries. Validated at the next `run_*`
    /// call; entries are CIDR ranges or bare addresses.
    pub fn set_trusted_proxies(&self, entries: Vec<String>) {
        *self
            .trusted_cidrs
            .lock()
            .expect("trusted proxy lock poisoned") = entries;
    }

    /// Signal all accept loops of this engine to stop.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Validate startup configuration shared by every transport. Runs
    /// before any bind so that a bad trusted-proxy entry aborts all five
    /// transport kinds identically.
    fn startup(&self) -> Result<Arc<Dispatcher>, TransportError> {
        let entries = self
            .trusted_cidrs
            .lock()
            .expect("trusted proxy lock poisoned")
            .clone();
        let trusted = TrustedProxies::parse(&entries)?;
        if !trusted.is_empty() {
            tracing::info!(ranges = entries.len(), "trusted proxy resolution enabled");
        }
        Ok(Arc::new(Dispatcher::new(self.snapshot.clone(), trusted)))
    }

    /// Serve over plain TCP on the configured address.
    pub async fn run(&self, config: &ServerConfig) -> Result<(), TransportError> {
        let dispatcher = self.startup()?;
        let addr = config.bind_address();
        let listener = bind_tcp(&addr).await?;
        log_listening(&listener, "http");
        serve(
            Acceptor::Plain(listener),
            dispatcher,
            self.shutdown.subscribe(),
        )
        .await
    }

    /// Serve over TCP with a TLS handshake layer.
    pub async fn run_tls(
        &self,
        addr: &str,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<(), TransportError> {
        let dispatcher = self.startup()?;
        let tls = build_acceptor(cert_path, key_path)?;
        let listener = bind_tcp(addr).await?;
        log_listening(&listener, "https");
        serve(
            Acceptor::Tls(listener, tls),
            dispatcher,
            self.shutdown.subscribe(),
        )
        .await
    }

    /// Serve over a Unix domain socket at `path`.
    #[cfg(unix)]
    pub async fn run_unix(&self, path: &Path) -> Result<(), TransportError> {
        let dispatcher = self.startup()?;
        let listener = crate::net::bind::bind_unix(path)?;
        tracing::info!(path = %path.display(), "listening on unix socket");
        serve(
            Acceptor::Unix(listener),
            dispatcher,
            self.shutdown.subscribe(),
        )
        .await
    }

    /// Serve over an inherited file descriptor (process handoff).
    ///
    /// Takes ownership of `fd`; the descriptor is closed when the listener
    /// is dropped, including on error. A descriptor that is not a listening
    /// TCP socket fails startup.
    #[cfg(unix)]
    pub async fn run_fd(&self, fd: std::os::fd::RawFd) -> Result<(), TransportError> {
        use std::os::fd::FromRawFd;

        // Ownership of the descriptor transfers here, per the contract above.
        let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
        let dispatcher = self.startup()?;
        let listener =
            adopt_std(std_listener).map_err(|source| TransportError::BadDescriptor { fd, source })?;
        log_listening(&listener, "inherited fd");
        serve(
            Acceptor::Plain(listener),
            dispatcher,
            self.shutdown.subscribe(),
        )
        .await
    }

    /// Serve over an already-constructed listener.
    pub async fn run_listener(
        &self,
        listener: std::net::TcpListener,
    ) -> Result<(), TransportError> {
        let dispatcher = self.startup()?;
        let listener = adopt_std(listener).map_err(TransportError::ClosedListener)?;
        log_listening(&listener, "external listener");
        serve(
            Acceptor::Plain(listener),
            dispatcher,
            self.shutdown.subscribe(),
        )
        .await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn log_listening(listener: &tokio::net::TcpListener, transport: &str) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, transport, "listening");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;

    #[test]
    fn registration_publishes_a_fresh_snapshot() {
        let engine = Engine::new();
        assert!(engine
            .snapshot
            .load()
            .resolve(&Method::GET, "/a")
            .is_none());

        engine.get("/a", vec![handler_fn(|_| {})]).unwrap();
        assert!(engine.snapshot.load().resolve(&Method::GET, "/a").is_some());
    }

    #[test]
    fn failed_registration_keeps_the_old_snapshot() {
        let engine = Engine::new();
        engine.get("/users/:id", vec![handler_fn(|_| {})]).unwrap();
        engine
            .get("/users/:name", vec![handler_fn(|_| {})])
            .unwrap_err();

        let snapshot = engine.snapshot.load();
        let (_, params) = snapshot.resolve(&Method::GET, "/users/1").unwrap();
        assert_eq!(params.get("id"), Some("1"));
    }

    #[tokio::test]
    async fn bad_trusted_cidr_aborts_startup_before_binding() {
        let engine = Engine::new();
        engine.set_trusted_proxies(vec!["hello/world".to_string()]);
        let err = engine.startup().err().unwrap();
        assert!(matches!(err, TransportError::Config(_)));
    }
}
