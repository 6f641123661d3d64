//! The HTTP resource-method model.
//!
//! A [`ResourceMethod`] is one handler bound to an HTTP method, with the
//! media types it consumes and produces and an ordered binding plan. The
//! plan is checked when the method is built and again against its template
//! when it is registered; at dispatch time it is replayed into [`Args`]
//! without further inspection.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::header::HeaderName;
use http::Method;

use hermes_core::{BoxFuture, MediaType, RegistrationError, RegistrationResult, Response};

use crate::context::RequestContext;

/// Where one handler argument comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamBinding {
    /// A variable captured by the matched template.
    PathVariable(String),
    /// The request body.
    Body,
    /// The first value of a request header.
    Header(HeaderName),
    /// The first value of a query parameter.
    Query(String),
    /// The [`RequestContext`] itself.
    Context,
}

impl ParamBinding {
    /// Binds a path variable.
    pub fn path(name: impl Into<String>) -> Self {
        Self::PathVariable(name.into())
    }

    /// Binds a query parameter.
    pub fn query(name: impl Into<String>) -> Self {
        Self::Query(name.into())
    }

    /// Binds a header.
    pub fn header(name: HeaderName) -> Self {
        Self::Header(name)
    }
}

/// One materialized argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A path variable, header or query value. Absent headers and query
    /// parameters bind as `None`.
    Text(Option<String>),
    /// The request body.
    Body(Bytes),
    /// The request context.
    Context(Arc<RequestContext>),
}

/// Handler arguments, in binding-plan order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Arg>,
}

impl Args {
    /// Replays a binding plan against a request.
    pub fn bind(plan: &[ParamBinding], ctx: &Arc<RequestContext>, body: &Bytes) -> Self {
        let values = plan
            .iter()
            .map(|binding| match binding {
                ParamBinding::PathVariable(name) => {
                    Arg::Text(ctx.path_param(name).map(str::to_owned))
                }
                ParamBinding::Body => Arg::Body(body.clone()),
                ParamBinding::Header(name) => Arg::Text(ctx.header(name).map(str::to_owned)),
                ParamBinding::Query(name) => Arg::Text(ctx.query_param(name)),
                ParamBinding::Context => Arg::Context(Arc::clone(ctx)),
            })
            .collect();
        Self { values }
    }

    /// The argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.values.get(index)
    }

    /// The text argument at `index`, if present and bound.
    pub fn text(&self, index: usize) -> Option<&str> {
        match self.values.get(index) {
            Some(Arg::Text(Some(value))) => Some(value),
            _ => None,
        }
    }

    /// The body argument at `index`.
    pub fn body(&self, index: usize) -> Option<&Bytes> {
        match self.values.get(index) {
            Some(Arg::Body(body)) => Some(body),
            _ => None,
        }
    }

    /// The context argument at `index`.
    pub fn context(&self, index: usize) -> Option<&RequestContext> {
        match self.values.get(index) {
            Some(Arg::Context(ctx)) => Some(ctx),
            _ => None,
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the plan binds nothing.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A handler invoked once with the fully read body.
///
/// Implemented for any `Fn(Args) -> impl Future<Output = anyhow::Result<Response>>`.
/// Returning a [`hermes_core::HandlerException`] sends its response as is;
/// any other error goes through the exception mappers.
pub trait ResourceHandler: Send + Sync + 'static {
    /// Handles one request.
    fn call(&self, args: Args) -> BoxFuture<'static, anyhow::Result<Response>>;
}

impl<F, Fut> ResourceHandler for F
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    fn call(&self, args: Args) -> BoxFuture<'static, anyhow::Result<Response>> {
        Box::pin(self(args))
    }
}

/// Receives a request body chunk by chunk.
pub trait StreamingHandler: Send {
    /// Consumes one chunk.
    fn chunk(&mut self, chunk: Bytes) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Called after the last chunk; produces the response.
    fn end(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<Response>>;
}

/// Opens a [`StreamingHandler`] for each request.
///
/// Implemented for any `Fn(Args) -> Box<dyn StreamingHandler>`.
pub trait StreamingResource: Send + Sync + 'static {
    /// Starts handling a request.
    fn open(&self, args: Args) -> Box<dyn StreamingHandler>;
}

impl<F> StreamingResource for F
where
    F: Fn(Args) -> Box<dyn StreamingHandler> + Send + Sync + 'static,
{
    fn open(&self, args: Args) -> Box<dyn StreamingHandler> {
        self(args)
    }
}

/// How a resource method consumes its body.
#[derive(Clone)]
pub enum Invoker {
    /// Read the whole body, then call once.
    Buffered(Arc<dyn ResourceHandler>),
    /// Feed chunks as they arrive.
    Streaming(Arc<dyn StreamingResource>),
}

impl Invoker {
    /// Returns true for streaming methods.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

/// One HTTP method on a resource.
#[derive(Clone)]
pub struct ResourceMethod {
    name: String,
    method: Method,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    bindings: Vec<ParamBinding>,
    invoker: Invoker,
}

impl ResourceMethod {
    /// Starts building a resource method.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_core::{Response, ResponseExt};
    /// use hermes_http::{Args, ParamBinding, ResourceMethod};
    /// use http::{Method, StatusCode};
    ///
    /// let method = ResourceMethod::builder("getUser", Method::GET)
    ///     .produces("text/plain")
    ///     .bind(ParamBinding::path("id"))
    ///     .handler(|args: Args| async move {
    ///         let id = args.text(0).unwrap_or_default().to_owned();
    ///         Ok(Response::text(StatusCode::OK, format!("user {id}")))
    ///     })
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(method.name(), "getUser");
    /// ```
    pub fn builder(name: impl Into<String>, method: Method) -> ResourceMethodBuilder {
        ResourceMethodBuilder {
            name: name.into(),
            method,
            consumes: Vec::new(),
            produces: Vec::new(),
            bindings: Vec::new(),
            invoker: None,
        }
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The HTTP method served.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Accepted request media types; empty means any.
    pub fn consumes(&self) -> &[MediaType] {
        &self.consumes
    }

    /// Produced media types in preference order; empty means any.
    pub fn produces(&self) -> &[MediaType] {
        &self.produces
    }

    /// The binding plan.
    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    /// The invoker.
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Path variables the plan binds.
    pub fn path_variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|b| match b {
            ParamBinding::PathVariable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Returns true if both serve the same method with the same media types.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.method == other.method
            && self.consumes == other.consumes
            && self.produces == other.produces
    }
}

impl fmt::Debug for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMethod")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .field("bindings", &self.bindings)
            .field("streaming", &self.invoker.is_streaming())
            .finish()
    }
}

/// Builder for [`ResourceMethod`].
pub struct ResourceMethodBuilder {
    name: String,
    method: Method,
    consumes: Vec<String>,
    produces: Vec<String>,
    bindings: Vec<ParamBinding>,
    invoker: Option<Invoker>,
}

impl ResourceMethodBuilder {
    /// Adds an accepted request media type.
    #[must_use]
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    /// Adds a produced media type; earlier entries are preferred.
    #[must_use]
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    /// Appends a parameter binding.
    #[must_use]
    pub fn bind(mut self, binding: ParamBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Sets a buffered handler.
    #[must_use]
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.invoker = Some(Invoker::Buffered(Arc::new(handler)));
        self
    }

    /// Sets a streaming handler.
    #[must_use]
    pub fn streaming<F>(mut self, open: F) -> Self
    where
        F: Fn(Args) -> Box<dyn StreamingHandler> + Send + Sync + 'static,
    {
        self.invoker = Some(Invoker::Streaming(Arc::new(open)));
        self
    }

    /// Sets a prebuilt invoker.
    #[must_use]
    pub fn invoker(mut self, invoker: Invoker) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Validates and builds the method.
    ///
    /// Fails with [`RegistrationError::InvalidResource`] if a media type does
    /// not parse, no handler is set, the body is bound more than once, or a
    /// streaming method binds the body.
    pub fn build(self) -> RegistrationResult<ResourceMethod> {
        let name = self.name;
        let parse = |types: Vec<String>| {
            types
                .iter()
                .map(|t| {
                    MediaType::parse(t).map_err(|e| {
                        RegistrationError::invalid_resource(&name, format!("media type {t}: {e}"))
                    })
                })
                .collect::<RegistrationResult<Vec<_>>>()
        };
        let consumes = parse(self.consumes)?;
        let produces = parse(self.produces)?;

        let Some(invoker) = self.invoker else {
            return Err(RegistrationError::invalid_resource(&name, "no handler"));
        };

        let bodies = self
            .bindings
            .iter()
            .filter(|b| **b == ParamBinding::Body)
            .count();
        if bodies > 1 {
            return Err(RegistrationError::invalid_resource(&name, "body bound more than once"));
        }
        if bodies == 1 && invoker.is_streaming() {
            return Err(RegistrationError::invalid_resource(
                &name,
                "streaming method cannot bind the body",
            ));
        }

        Ok(ResourceMethod {
            name,
            method: self.method,
            consumes,
            produces,
            bindings: self.bindings,
            invoker,
        })
    }
}
