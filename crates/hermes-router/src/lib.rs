//! URI template router for Hermes.
//!
//! This crate maps a set of registered URI templates, each carrying one
//! opaque payload, to the single best match for an incoming path. Both the
//! HTTP and the WebSocket dispatchers resolve their destinations through it.
//!
//! # Features
//!
//! - **Path variables**: `{name}` captures one non-empty segment
//! - **Wildcards**: a trailing `*` or `*name` captures the rest of the path
//! - **Specificity**: literal segments beat variables, variables beat wildcards
//! - **Deterministic ties**: the first registered template wins
//! - **Duplicate detection**: two templates with the same shape are rejected
//!
//! # Example
//!
//! ```rust
//! use hermes_router::PatternRouter;
//!
//! let mut router = PatternRouter::new();
//! router.register("/chat/{name}", "chat").unwrap();
//! router.register("/files/*path", "files").unwrap();
//!
//! let found = router.match_path("/chat/alice").unwrap();
//! assert_eq!(*found.destination, "chat");
//! assert_eq!(found.params.get("name"), Some("alice"));
//!
//! let found = router.match_path("/files/img/logo.png").unwrap();
//! assert_eq!(found.params.get("path"), Some("img/logo.png"));
//! ```
//!
//! # Selection
//!
//! ```text
//!   /a/b   ─┐
//!   /a/{x} ─┼─ match "/a/b" ─▶ rank (literals desc, non-literals asc,
//!   /a/*   ─┘                        wildcard last, registration asc)
//!                               ─▶ "/a/b"
//! ```

mod error;
mod params;
mod router;
mod template;

pub use error::{RouterError, RouterResult};
pub use params::Params;
pub use router::{PatternRouter, RoutableDestination};
pub use template::{RouteTemplate, Segment};
