//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Bind request (address / cert+key / socket path / fd / listener)
//!     → bind.rs (create or adopt the listener, accept loop)
//!     → tls.rs (optional rustls handshake)
//!     → Hand off to the HTTP layer, one task per connection
//!
//! Client-address resolution (per request):
//!     socket peer + X-Forwarded-For
//!     → trusted.rs (walk the chain backward through trusted CIDRs)
//! ```
//!
//! # Design Decisions
//! - All five transport kinds converge on one accept loop with uniform
//!   startup and failure semantics
//! - Trusted-proxy configuration is validated before any bind; spoofing
//!   protection is never silently skipped
//! - A failed bind attempt never corrupts state shared with other bindings

pub mod bind;
pub mod tls;
pub mod trusted;

pub use bind::TransportError;
pub use trusted::TrustedProxies;
