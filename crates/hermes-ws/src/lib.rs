//! WebSocket dispatch for Hermes.
//!
//! An endpoint is declared with an [`EndpointDefinition`], validated once
//! into an [`Endpoint`] and registered in an [`EndpointRegistry`] under its
//! URI template. The [`WebSocketDispatcher`] then routes each inbound
//! [`Frame`]:
//!
//! - an open frame resolves the endpoint by URI and runs `onOpen`
//! - text, binary and pong frames run the matching callback, in arrival
//!   order per session
//! - a close frame runs `onClose` and ends the session
//!
//! A callback's [`Reply`] is sent back on the same [`Session`]. Callback
//! failures go to `onError`, or to the log when it is absent; the core
//! never sends an error frame of its own.
//!
//! # Example
//!
//! ```
//! use hermes_ws::{
//!     CallbackArgs, CallbackKind, EndpointDefinition, EndpointRegistry, ParamDecl, Reply,
//!     ReturnKind, WebSocketDispatcher,
//! };
//!
//! let mut registry = EndpointRegistry::new();
//! registry
//!     .register(
//!         EndpointDefinition::new("Chat").uri("/chat/{name}").callback(
//!             CallbackKind::Text,
//!             [ParamDecl::path("name"), ParamDecl::Text],
//!             ReturnKind::Text,
//!             |args: CallbackArgs| async move {
//!                 let name = args.text(0).unwrap_or_default();
//!                 let text = args.text(1).unwrap_or_default();
//!                 Ok(Reply::text(format!("{name}: {text}")))
//!             },
//!         ),
//!     )
//!     .unwrap();
//!
//! let dispatcher = WebSocketDispatcher::with_registry(registry);
//! assert_eq!(dispatcher.session_count(), 0);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod registry;
pub mod session;

pub use dispatcher::{SessionState, WebSocketDispatcher, DEFAULT_QUEUE_CAPACITY};
pub use endpoint::{
    validate, Binding, Callback, CallbackArgs, CallbackHandler, CallbackKind, Endpoint,
    EndpointDefinition, ParamDecl, Payload, Reply, ReturnKind, Value,
};
pub use error::{CloseCode, WsError, WsResult};
pub use frame::{check_upgrade, CloseReason, Frame, FrameKind};
pub use registry::EndpointRegistry;
pub use session::{Session, SessionId};

/// Failures of WebSocket dispatch, by their taxonomy name.
pub type WebSocketDispatchError = WsError;
