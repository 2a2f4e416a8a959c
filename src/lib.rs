//! Trellis: an HTTP request-dispatch core.
//!
//! A compressed prefix tree maps request paths (with `:name` parameter and
//! `*name` catch-all segments) to handler chains, with conflicts rejected
//! at registration time. Client addresses are recovered from
//! `X-Forwarded-For` chains against a configured trusted-proxy list. One
//! registered handler graph can be exposed over plain TCP, TLS, Unix domain
//! sockets, an inherited file descriptor, or a caller-supplied listener.
//!
//! # Architecture
//! - [`routing`]: the route tree (registration, conflict detection, match
//!   resolution with parameter capture)
//! - [`http`]: handler chains, the per-request [`Context`], per-connection
//!   serving and dispatch
//! - [`net`]: transport bindings, TLS setup, trusted-proxy resolution
//! - [`config`]: file-based configuration with eager validation
//! - [`engine`]: the façade tying registration to the transport entry
//!   points
//!
//! # Quick Start
//! ```no_run
//! use trellis::{handler_fn, Engine, ServerConfig, StatusCode};
//!
//! # async fn demo() -> Result<(), trellis::TransportError> {
//! let engine = Engine::new();
//! engine
//!     .get("/users/:id", vec![handler_fn(|ctx| {
//!         let id = ctx.param("id").unwrap_or("").to_string();
//!         ctx.string(StatusCode::OK, format!("user {id}"));
//!     })])
//!     .expect("route conflict");
//! engine.run(&ServerConfig::default()).await
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::{load_config, ConfigError, ServerConfig, TlsConfig};
pub use engine::Engine;
pub use http::{handler_fn, Context, Handler, HandlerChain};
pub use net::{TransportError, TrustedProxies};
pub use routing::{Params, RegistrationError};

// Re-exported so callers registering routes and writing handlers need no
// direct hyper dependency.
pub use hyper::{Method, StatusCode};
