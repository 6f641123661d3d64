//! HTTP dispatch for Hermes.
//!
//! This crate turns an [`InboundRequest`] into exactly one
//! [`hermes_core::Response`]:
//!
//! 1. the path is resolved against the [`ResourceRegistry`]
//! 2. the resource method is chosen by HTTP method, `consumes` and
//!    `produces`, and the response type is negotiated
//! 3. the [`InterceptorChain`] runs its pre-call stage
//! 4. the method is invoked, buffered or streaming
//! 5. the chain's post-call stage observes the status
//!
//! Failures at any step become a status-coded response; see
//! [`hermes_core::DispatchError`].
//!
//! # Example
//!
//! ```
//! use hermes_core::{Response, ResponseExt};
//! use hermes_http::{Args, HttpDispatcher, HttpRoutes, InboundRequest, ParamBinding, ResourceMethod};
//! use http::{Method, StatusCode};
//!
//! # tokio_test::block_on(async {
//! let mut routes = HttpRoutes::new();
//! routes
//!     .register_resource(
//!         "/hello/{name}",
//!         ResourceMethod::builder("hello", Method::GET)
//!             .produces("text/plain")
//!             .bind(ParamBinding::path("name"))
//!             .handler(|args: Args| async move {
//!                 let name = args.text(0).unwrap_or("nobody").to_owned();
//!                 Ok(Response::text(StatusCode::OK, format!("hello {name}")))
//!             })
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let dispatcher = HttpDispatcher::with_routes(routes);
//! let request = InboundRequest::new(Method::GET, "/hello/ada".parse().unwrap());
//! let response = dispatcher.dispatch(request).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # });
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod dispatcher;
pub mod interceptor;
pub mod registry;
pub mod request;
pub mod resource;

pub use context::RequestContext;
pub use dispatcher::{DispatchState, HttpDispatcher};
pub use interceptor::{Flow, Interceptor, InterceptorChain};
pub use registry::{ContentType, HttpRoutes, ResourceGroup, ResourceRegistry};
pub use request::{InboundRequest, RequestBody};
pub use resource::{
    Arg, Args, Invoker, ParamBinding, ResourceHandler, ResourceMethod, ResourceMethodBuilder,
    StreamingHandler, StreamingResource,
};
