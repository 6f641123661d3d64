//! The HTTP dispatcher.
//!
//! Each request walks the same states:
//!
//! ```text
//! ROUTING ─▶ NEGOTIATING ─▶ INTERCEPTING_PRE ─▶ INVOKING ─▶ INTERCEPTING_POST ─▶ RESPONDING
//!    │            │                │                │               │
//!    └────────────┴────────────────┴───── FAILED ◀──┴───────────────┘
//! ```
//!
//! Exactly one response comes out of [`HttpDispatcher::dispatch`], and the
//! inbound request is released before it returns.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

use hermes_core::{
    parse_accept, DispatchError, DispatchResult, MediaType, Response,
};
use hermes_telemetry::metrics::record_http_dispatch;

use crate::context::RequestContext;
use crate::interceptor::{handler_exception, Flow};
use crate::registry::{ContentType, HttpRoutes};
use crate::request::InboundRequest;
use crate::resource::{Args, Invoker, ResourceMethod};

/// Dispatch states, as they appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Resolving the path and method.
    Routing,
    /// Checking content type and picking the response type.
    Negotiating,
    /// Running pre-call interceptors.
    InterceptingPre,
    /// Invoking the resource method.
    Invoking,
    /// Running post-call interceptors.
    InterceptingPost,
    /// Sending the response.
    Responding,
    /// A failure is being turned into a response.
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Routing => "ROUTING",
            Self::Negotiating => "NEGOTIATING",
            Self::InterceptingPre => "INTERCEPTING_PRE",
            Self::Invoking => "INVOKING",
            Self::InterceptingPost => "INTERCEPTING_POST",
            Self::Responding => "RESPONDING",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Dispatches HTTP requests against a swappable [`HttpRoutes`] table.
///
/// The table is loaded once per request, so a concurrent registration is
/// seen either entirely or not at all.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    routes: Arc<ArcSwap<HttpRoutes>>,
    default_media_type: MediaType,
}

impl HttpDispatcher {
    /// Creates a dispatcher over a shared table.
    pub fn new(routes: Arc<ArcSwap<HttpRoutes>>, default_media_type: MediaType) -> Self {
        Self {
            routes,
            default_media_type,
        }
    }

    /// Creates a dispatcher that owns a fixed table.
    pub fn with_routes(routes: HttpRoutes) -> Self {
        Self::new(Arc::new(ArcSwap::from_pointee(routes)), MediaType::any())
    }

    /// The shared table.
    pub fn routes(&self) -> &Arc<ArcSwap<HttpRoutes>> {
        &self.routes
    }

    /// Dispatches one request and returns its single response.
    pub async fn dispatch(&self, mut request: InboundRequest) -> Response {
        let started = Instant::now();
        let routes = self.routes.load_full();

        let response = match self.run(&routes, &mut request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    state = %DispatchState::Failed,
                    method = %request.method(),
                    path = %request.path(),
                    status = err.status_code().as_u16(),
                    error = %err,
                    "Dispatch failed"
                );
                err.into_response()
            }
        };

        debug!(
            state = %DispatchState::Responding,
            method = %request.method(),
            path = %request.path(),
            status = response.status().as_u16(),
            "Responding"
        );
        record_http_dispatch(response.status().as_u16(), started.elapsed());
        drop(request);
        response
    }

    async fn run(
        &self,
        routes: &HttpRoutes,
        request: &mut InboundRequest,
    ) -> DispatchResult<Response> {
        trace_state(DispatchState::Routing, request);
        let found = routes
            .resources()
            .lookup(request.path())
            .ok_or_else(|| DispatchError::not_found(request.path()))?;

        trace_state(DispatchState::Negotiating, request);
        let content_type = content_type(request);
        let content_type = match &content_type {
            None => ContentType::Absent,
            Some(Ok(media)) => ContentType::Parsed(media),
            Some(Err(raw)) => ContentType::Malformed(raw),
        };
        let accept = parse_accept(request.header_str(&ACCEPT));
        let (method, response_type) = found.destination.select(
            request.method(),
            content_type,
            &accept,
            &self.default_media_type,
        )?;

        let ctx = Arc::new(RequestContext::new(request, found.params, response_type));

        trace_state(DispatchState::InterceptingPre, request);
        if let Flow::ShortCircuit(response) = routes.interceptors().pre_call(&ctx).await? {
            return Ok(response);
        }

        trace_state(DispatchState::Invoking, request);
        let mut response = match invoke(method, &ctx, request).await {
            Ok(response) => response,
            Err(err) => return handler_failure(routes, method, &ctx, err),
        };

        trace_state(DispatchState::InterceptingPost, request);
        routes
            .interceptors()
            .post_call(&ctx, response.status())
            .await?;

        let negotiated = ctx.response_type();
        if negotiated.is_concrete() && !response.headers().contains_key(CONTENT_TYPE) {
            if let Ok(value) = HeaderValue::from_str(negotiated.essence()) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
        }
        Ok(response)
    }
}

fn trace_state(state: DispatchState, request: &InboundRequest) {
    debug!(
        state = %state,
        method = %request.method(),
        path = %request.path(),
        "Dispatch state"
    );
}

/// The request's content type. A header that is not a media type is kept
/// as text so method selection can still run.
fn content_type(request: &InboundRequest) -> Option<Result<MediaType, String>> {
    let value = request.headers().get(CONTENT_TYPE)?;
    let raw = String::from_utf8_lossy(value.as_bytes());
    Some(MediaType::parse(&raw).map_err(|_| raw.into_owned()))
}

async fn invoke(
    method: &ResourceMethod,
    ctx: &Arc<RequestContext>,
    request: &mut InboundRequest,
) -> anyhow::Result<Response> {
    match method.invoker() {
        Invoker::Buffered(handler) => {
            let body = request.take_body().collect().await?;
            let args = Args::bind(method.bindings(), ctx, &body);
            handler.call(args).await
        }
        Invoker::Streaming(resource) => {
            let args = Args::bind(method.bindings(), ctx, &Bytes::new());
            let mut handler = resource.open(args);
            let mut chunks = request.take_body().into_stream();
            while let Some(chunk) = chunks.next().await {
                handler.chunk(chunk?).await?;
            }
            handler.end().await
        }
    }
}

/// Handler exceptions are sent as is; anything else goes to the mappers,
/// then to the generic 500.
fn handler_failure(
    routes: &HttpRoutes,
    method: &ResourceMethod,
    ctx: &RequestContext,
    err: anyhow::Error,
) -> DispatchResult<Response> {
    if let Some(exception) = handler_exception(&err) {
        return Err(DispatchError::Handler(exception));
    }
    if let Some(response) = routes.mappers().map(&err) {
        debug!(
            request_id = %ctx.request_id(),
            resource = method.name(),
            status = response.status().as_u16(),
            "Handler error mapped"
        );
        return Ok(response);
    }
    warn!(
        request_id = %ctx.request_id(),
        resource = method.name(),
        error = ?err,
        "Unmapped handler error"
    );
    Err(DispatchError::unmapped(err))
}
