//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (startup):
//!     (method, "/users/:id", chain)
//!     → tree.rs (insert, split compressed prefixes, detect conflicts)
//!     → Frozen per-method radix trees
//!
//! Incoming Request (method, path):
//!     → tree.rs (descend segment tree, static > param > catch-all)
//!     → Return: matched chain + captured params, or explicit NotFound
//! ```
//!
//! # Design Decisions
//! - Compressed radix tree per HTTP method; lookup cost is O(path length),
//!   independent of how many routes are registered
//! - No regex in the hot path; patterns are limited to static text,
//!   `:name` single-segment captures and `*name` trailing catch-alls
//! - Conflicts are registration-time errors, never request-time surprises
//! - Trailing slashes are significant: `/a` and `/a/` are distinct routes

pub mod params;
pub mod tree;

pub use params::Params;
pub use tree::{RegistrationError, Router};
