//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS/Unix connection
//!     → server.rs (hyper connection serving, HTTP/1.1 + HTTP/2)
//!     → dispatch: route tree lookup + trusted-proxy client resolution
//!     → context.rs (per-request Context: params, client IP, response parts)
//!     → handler.rs (run the matched chain front to back)
//!     → Send response
//! ```

pub mod context;
pub mod handler;
pub mod server;

pub use context::Context;
pub use handler::{handler_fn, Handler, HandlerChain};
