//! # Hermes
//!
//! **Request-dispatch core for a microservices runtime.**
//!
//! Given an inbound HTTP request or WebSocket frame, Hermes finds the single
//! best-matching registered endpoint, binds the message into the endpoint's
//! declared parameters, invokes it and turns the result, or the failure,
//! back into a protocol response.
//!
//! - **Routing** – URI templates with path variables and wildcards, most
//!   specific match wins ([`router`])
//! - **HTTP** – method selection, content negotiation, interceptors,
//!   exception mappers, buffered and streaming bodies ([`http`])
//! - **WebSocket** – endpoints validated once at registration, per-session
//!   ordered callbacks ([`ws`])
//! - **Channels** – one [`MicroserviceRegistry`] per transport listener,
//!   mutable while dispatch is running
//!
//! ## Quick Start
//!
//! ```
//! use hermes::prelude::*;
//! use http::{Method, StatusCode};
//!
//! # tokio_test::block_on(async {
//! let hermes = Hermes::new(HermesConfig::default()).unwrap();
//! let registry = hermes.channel(&"http-8080".into());
//! registry
//!     .register_resource(
//!         "/greet/{name}",
//!         ResourceMethod::builder("greet", Method::GET)
//!             .produces("text/plain")
//!             .bind(ParamBinding::path("name"))
//!             .handler(|args: Args| async move {
//!                 let name = args.text(0).unwrap_or_default().to_owned();
//!                 Ok(Response::text(StatusCode::OK, format!("hello {name}")))
//!             })
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let (responder, response) = Responder::channel();
//! hermes
//!     .processor()
//!     .submit(InboundMessage::Http {
//!         channel: "http-8080".into(),
//!         request: InboundRequest::new(Method::GET, "/greet/ada".parse().unwrap()),
//!         responder,
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(response.await.unwrap().status(), StatusCode::OK);
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! transport ─▶ MessageProcessor ─▶ ChannelRegistries ─▶ MicroserviceRegistry
//!                                                        ├─ HttpDispatcher ─▶ resource
//!                                                        └─ WebSocketDispatcher ─▶ callback
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod error;
pub mod processor;
pub mod registry;
pub mod runtime;

pub use channel::{ChannelId, ChannelRegistries};
pub use error::{HermesError, HermesResult};
pub use processor::{InboundMessage, MessageProcessor, Responder};
pub use registry::{MicroserviceRegistry, RegistrySettings};
pub use runtime::Hermes;

// Re-export the component crates
pub use hermes_config as config;
pub use hermes_core as core;
pub use hermes_http as http;
pub use hermes_router as router;
pub use hermes_telemetry as telemetry;
pub use hermes_ws as ws;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ChannelId, ChannelRegistries, Hermes, HermesError, HermesResult, InboundMessage,
        MessageProcessor, MicroserviceRegistry, Responder,
    };

    pub use hermes_config::{ConfigLoader, HermesConfig};

    pub use hermes_core::{
        DispatchError, ExceptionMapper, HandlerException, MediaType, RegistrationError, Response,
        ResponseExt,
    };

    pub use hermes_http::{
        Args, Flow, InboundRequest, Interceptor, ParamBinding, RequestContext, ResourceMethod,
        StreamingHandler,
    };

    pub use hermes_ws::{
        CallbackArgs, CallbackKind, CloseCode, CloseReason, EndpointDefinition, Frame, ParamDecl,
        Reply, ReturnKind, Session, SessionId, WsError,
    };
}
