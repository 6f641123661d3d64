//! The interceptor pipeline.
//!
//! Interceptors run in registration order around every routed request.
//! `pre_call` may let the request through or short-circuit it with its own
//! response; `post_call` observes the final status after a successful
//! invocation and cannot change the body.
//!
//! ```text
//!   pre(1) ─▶ pre(2) ─▶ ... ─▶ handler ─▶ post(1) ─▶ post(2) ─▶ ...
//!     │
//!     └── ShortCircuit(response) ─▶ respond (no handler, no post)
//! ```

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, warn};

use hermes_core::{BoxFuture, DispatchError, DispatchResult, HandlerException, Response};

use crate::context::RequestContext;

/// Outcome of a pre-call stage.
#[derive(Debug)]
pub enum Flow {
    /// Continue to the next stage.
    Continue,
    /// Stop and send this response.
    ShortCircuit(Response),
}

/// A pre/post hook around resource invocation.
///
/// An error from `pre_call` that carries a [`HandlerException`] is sent as
/// that exception's response; any other error yields `500` with an empty
/// body. Errors never reach exception mappers.
pub trait Interceptor: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs before the resource method.
    fn pre_call<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, anyhow::Result<Flow>>;

    /// Runs after a successful invocation with the response status.
    fn post_call<'a>(
        &'a self,
        ctx: &'a RequestContext,
        status: StatusCode,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        let _ = (ctx, status);
        Box::pin(async { Ok(()) })
    }
}

/// Registered interceptors, in order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns true if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs every `pre_call` until one short-circuits or fails.
    pub async fn pre_call(&self, ctx: &RequestContext) -> DispatchResult<Flow> {
        for interceptor in &self.interceptors {
            match interceptor.pre_call(ctx).await {
                Ok(Flow::Continue) => {}
                Ok(flow @ Flow::ShortCircuit(_)) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        interceptor = interceptor.name(),
                        "Request short-circuited"
                    );
                    return Ok(flow);
                }
                Err(err) => {
                    if let Some(exception) = handler_exception(&err) {
                        return Err(DispatchError::Handler(exception));
                    }
                    return Err(failure(interceptor.as_ref(), ctx, err));
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Runs every `post_call`; the first failure stops the chain.
    pub async fn post_call(&self, ctx: &RequestContext, status: StatusCode) -> DispatchResult<()> {
        for interceptor in &self.interceptors {
            if let Err(err) = interceptor.post_call(ctx, status).await {
                return Err(failure(interceptor.as_ref(), ctx, err));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.name()))
            .finish()
    }
}

/// Finds a [`HandlerException`] anywhere in an error chain.
pub(crate) fn handler_exception(err: &anyhow::Error) -> Option<HandlerException> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<HandlerException>())
        .cloned()
}

fn failure(interceptor: &dyn Interceptor, ctx: &RequestContext, err: anyhow::Error) -> DispatchError {
    warn!(
        request_id = %ctx.request_id(),
        interceptor = interceptor.name(),
        error = ?err,
        "Interceptor failed"
    );
    DispatchError::interceptor(interceptor.name(), err)
}
