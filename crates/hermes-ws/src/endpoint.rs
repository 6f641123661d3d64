//! The WebSocket endpoint model and its validator.
//!
//! An endpoint is declared as an [`EndpointDefinition`]: a name, a URI
//! template and up to one callback per [`CallbackKind`]. Each callback
//! declares its parameters as [`ParamDecl`]s and its result as a
//! [`ReturnKind`]. [`EndpointDefinition::validate`] checks every
//! declaration against the rules for its kind and compiles it into a
//! [`Binding`] plan, producing an [`Endpoint`]. Nothing is inspected again
//! at dispatch time.
//!
//! | Callback | Allowed besides session and path variables | Required |
//! |---|---|---|
//! | `onOpen` | nothing | - |
//! | `onText` | one text payload | the payload |
//! | `onBinary` | one `Bytes` or byte-array payload, one final-fragment flag | the payload |
//! | `onPong` | one pong payload | the payload |
//! | `onClose` | one close reason | - |
//! | `onError` | one error | the error |

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use hermes_core::{BoxFuture, RegistrationError, RegistrationResult};
use hermes_router::{Params, RouteTemplate};

use crate::error::{WsError, WsResult};
use crate::frame::CloseReason;
use crate::session::Session;

/// The events an endpoint can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// The session was opened.
    Open,
    /// A text frame arrived.
    Text,
    /// A binary frame arrived.
    Binary,
    /// A pong frame arrived.
    Pong,
    /// The session is closing.
    Close,
    /// Another callback failed.
    Error,
}

impl CallbackKind {
    /// All kinds, in slot order.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Text,
        Self::Binary,
        Self::Pong,
        Self::Close,
        Self::Error,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "onOpen",
            Self::Text => "onText",
            Self::Binary => "onBinary",
            Self::Pong => "onPong",
            Self::Close => "onClose",
            Self::Error => "onError",
        };
        f.write_str(name)
    }
}

/// A declared callback parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamDecl {
    /// The session capability.
    Session,
    /// A string bound to a template variable.
    PathParam(String),
    /// An unbound string: the text payload.
    Text,
    /// A binary payload as a shared buffer.
    Bytes,
    /// A binary payload as an owned byte array.
    ByteArray,
    /// A boolean: the final-fragment flag of a binary frame.
    Bool,
    /// A pong payload.
    Pong,
    /// The close code and text.
    CloseReason,
    /// The error that triggered `onError`.
    Error,
    /// Any other parameter type, by name. Always rejected.
    Other(String),
}

impl ParamDecl {
    /// A path-variable parameter.
    pub fn path(name: impl Into<String>) -> Self {
        Self::PathParam(name.into())
    }

    /// A parameter of a type no rule allows.
    pub fn other(type_name: impl Into<String>) -> Self {
        Self::Other(type_name.into())
    }
}

impl fmt::Display for ParamDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => f.write_str("session"),
            Self::PathParam(name) => write!(f, "path parameter {name}"),
            Self::Text => f.write_str("unbound string"),
            Self::Bytes => f.write_str("byte buffer"),
            Self::ByteArray => f.write_str("byte array"),
            Self::Bool => f.write_str("boolean"),
            Self::Pong => f.write_str("pong message"),
            Self::CloseReason => f.write_str("close reason"),
            Self::Error => f.write_str("error"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// The declared result of a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnKind {
    /// Nothing is sent back.
    Void,
    /// Sent back as a text frame.
    Text,
    /// A byte buffer, sent back as a binary frame.
    Bytes,
    /// A byte array, sent back as a binary frame.
    ByteArray,
    /// Sent back as a pong frame.
    Pong,
    /// Any other type, by name. Always rejected.
    Other(String),
}

impl ReturnKind {
    /// Returns true if `reply` may be produced by a callback declaring this
    /// kind. [`Reply::None`] is always allowed.
    pub fn accepts(&self, reply: &Reply) -> bool {
        matches!(
            (self, reply),
            (_, Reply::None)
                | (Self::Text, Reply::Text(_))
                | (Self::Bytes | Self::ByteArray, Reply::Binary(_))
                | (Self::Pong, Reply::Pong(_))
        )
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Text => f.write_str("text"),
            Self::Bytes => f.write_str("byte buffer"),
            Self::ByteArray => f.write_str("byte array"),
            Self::Pong => f.write_str("pong message"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A compiled binding instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The session capability.
    Session,
    /// The value of a template variable.
    PathVariable(String),
    /// The text payload.
    Text,
    /// The binary payload as `Bytes`.
    Bytes,
    /// The binary payload as `Vec<u8>`.
    ByteArray,
    /// The final-fragment flag.
    FinalFragment,
    /// The pong payload.
    Pong,
    /// The close reason.
    CloseReason,
    /// The error being reported.
    Error,
}

/// The frame data a binding plan is replayed against.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Open frames carry nothing.
    None,
    /// A text payload.
    Text(String),
    /// A binary payload.
    Binary {
        /// The payload.
        data: Bytes,
        /// False while more fragments follow.
        final_fragment: bool,
    },
    /// A pong payload.
    Pong(Bytes),
    /// A close reason.
    Close(CloseReason),
    /// The failure reported to `onError`.
    Error(Arc<anyhow::Error>),
}

/// One materialized callback argument.
#[derive(Clone)]
pub enum Value {
    /// The session capability.
    Session(Arc<dyn Session>),
    /// A path variable or the text payload.
    Text(String),
    /// A binary payload as a buffer.
    Bytes(Bytes),
    /// A binary payload as a byte array.
    ByteArray(Vec<u8>),
    /// The final-fragment flag.
    Bool(bool),
    /// A pong payload.
    Pong(Bytes),
    /// A close reason.
    CloseReason(CloseReason),
    /// An error.
    Error(Arc<anyhow::Error>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(session) => f.debug_tuple("Session").field(&session.id()).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(data) => f.debug_tuple("Bytes").field(data).finish(),
            Self::ByteArray(data) => f.debug_tuple("ByteArray").field(data).finish(),
            Self::Bool(flag) => f.debug_tuple("Bool").field(flag).finish(),
            Self::Pong(data) => f.debug_tuple("Pong").field(data).finish(),
            Self::CloseReason(reason) => f.debug_tuple("CloseReason").field(reason).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(&err.to_string()).finish(),
        }
    }
}

/// Callback arguments, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct CallbackArgs {
    values: Vec<Value>,
}

impl CallbackArgs {
    /// Replays a binding plan against a frame.
    ///
    /// Fails if an instruction needs data the payload does not carry, which
    /// a validated plan never does for the frame kind it was compiled for.
    pub fn bind(
        plan: &[Binding],
        session: &Arc<dyn Session>,
        params: &Params,
        payload: &Payload,
    ) -> WsResult<Self> {
        let values = plan
            .iter()
            .map(|binding| resolve(binding, session, params, payload))
            .collect::<WsResult<Vec<_>>>()?;
        Ok(Self { values })
    }

    /// The argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// The session argument at `index`.
    pub fn session(&self, index: usize) -> Option<&Arc<dyn Session>> {
        match self.values.get(index) {
            Some(Value::Session(session)) => Some(session),
            _ => None,
        }
    }

    /// The text or path-variable argument at `index`.
    pub fn text(&self, index: usize) -> Option<&str> {
        match self.values.get(index) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// The binary argument at `index`, in either representation.
    pub fn bytes(&self, index: usize) -> Option<&[u8]> {
        match self.values.get(index) {
            Some(Value::Bytes(data) | Value::Pong(data)) => Some(data),
            Some(Value::ByteArray(data)) => Some(data),
            _ => None,
        }
    }

    /// The boolean argument at `index`.
    pub fn flag(&self, index: usize) -> Option<bool> {
        match self.values.get(index) {
            Some(Value::Bool(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// The close-reason argument at `index`.
    pub fn close_reason(&self, index: usize) -> Option<&CloseReason> {
        match self.values.get(index) {
            Some(Value::CloseReason(reason)) => Some(reason),
            _ => None,
        }
    }

    /// The error argument at `index`.
    pub fn error(&self, index: usize) -> Option<&anyhow::Error> {
        match self.values.get(index) {
            Some(Value::Error(err)) => Some(err),
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

fn resolve(
    binding: &Binding,
    session: &Arc<dyn Session>,
    params: &Params,
    payload: &Payload,
) -> WsResult<Value> {
    let value = match (binding, payload) {
        (Binding::Session, _) => Value::Session(Arc::clone(session)),
        (Binding::PathVariable(name), _) => {
            Value::Text(params.get(name).unwrap_or_default().to_owned())
        }
        (Binding::Text, Payload::Text(text)) => Value::Text(text.clone()),
        (Binding::Bytes, Payload::Binary { data, .. }) => Value::Bytes(data.clone()),
        (Binding::ByteArray, Payload::Binary { data, .. }) => Value::ByteArray(data.to_vec()),
        (Binding::FinalFragment, Payload::Binary { final_fragment, .. }) => {
            Value::Bool(*final_fragment)
        }
        (Binding::Pong, Payload::Pong(data)) => Value::Pong(data.clone()),
        (Binding::CloseReason, Payload::Close(reason)) => Value::CloseReason(reason.clone()),
        (Binding::Error, Payload::Error(err)) => Value::Error(Arc::clone(err)),
        (binding, _) => {
            return Err(WsError::binding(format!(
                "{binding:?} has no value in this frame"
            )))
        }
    };
    Ok(value)
}

/// What a callback sends back on its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing.
    None,
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Bytes),
    /// A pong frame.
    Pong(Bytes),
}

impl Reply {
    /// A text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A binary reply.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Short label used in errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "nothing",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Pong(_) => "pong",
        }
    }
}

/// The code behind one callback.
///
/// Implemented for any `Fn(CallbackArgs) -> impl Future<Output = anyhow::Result<Reply>>`.
pub trait CallbackHandler: Send + Sync + 'static {
    /// Handles one event.
    fn call(&self, args: CallbackArgs) -> BoxFuture<'static, anyhow::Result<Reply>>;
}

impl<F, Fut> CallbackHandler for F
where
    F: Fn(CallbackArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
    fn call(&self, args: CallbackArgs) -> BoxFuture<'static, anyhow::Result<Reply>> {
        Box::pin(self(args))
    }
}

struct CallbackDecl {
    kind: CallbackKind,
    params: Vec<ParamDecl>,
    returns: ReturnKind,
    handler: Arc<dyn CallbackHandler>,
}

/// An endpoint as declared, before validation.
///
/// # Example
///
/// ```
/// use hermes_ws::{CallbackArgs, CallbackKind, EndpointDefinition, ParamDecl, Reply, ReturnKind};
///
/// let endpoint = EndpointDefinition::new("Chat")
///     .uri("/chat/{name}")
///     .callback(
///         CallbackKind::Text,
///         [ParamDecl::path("name"), ParamDecl::Text, ParamDecl::Session],
///         ReturnKind::Text,
///         |args: CallbackArgs| async move {
///             let name = args.text(0).unwrap_or_default();
///             let text = args.text(1).unwrap_or_default();
///             Ok(Reply::text(format!("{name}: {text}")))
///         },
///     )
///     .validate()
///     .unwrap();
///
/// assert_eq!(endpoint.template().as_str(), "/chat/{name}");
/// ```
pub struct EndpointDefinition {
    name: String,
    uri: Option<String>,
    callbacks: Vec<CallbackDecl>,
}

impl EndpointDefinition {
    /// Starts a definition for the endpoint called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: None,
            callbacks: Vec::new(),
        }
    }

    /// Sets the URI template.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Declares a callback.
    pub fn callback<F, Fut>(
        mut self,
        kind: CallbackKind,
        params: impl IntoIterator<Item = ParamDecl>,
        returns: ReturnKind,
        handler: F,
    ) -> Self
    where
        F: Fn(CallbackArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
    {
        self.callbacks.push(CallbackDecl {
            kind,
            params: params.into_iter().collect(),
            returns,
            handler: Arc::new(handler),
        });
        self
    }

    /// Declares a callback backed by an existing handler.
    pub fn callback_handler(
        mut self,
        kind: CallbackKind,
        params: impl IntoIterator<Item = ParamDecl>,
        returns: ReturnKind,
        handler: Arc<dyn CallbackHandler>,
    ) -> Self {
        self.callbacks.push(CallbackDecl {
            kind,
            params: params.into_iter().collect(),
            returns,
            handler,
        });
        self
    }

    /// The endpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks every declaration and compiles the binding plans.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::Annotation`] if no URI is declared or a
    ///   callback kind is declared twice
    /// - [`RegistrationError::Route`] if the URI is not a valid template
    /// - [`RegistrationError::ParameterShape`] if a callback's parameters
    ///   or return kind break the rules for its kind
    pub fn validate(self) -> RegistrationResult<Endpoint> {
        let uri = self
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| RegistrationError::annotation(&self.name, "no URI template declared"))?;
        let template = RouteTemplate::parse(uri)?;

        let mut callbacks: [Option<Callback>; 6] = Default::default();
        for decl in self.callbacks {
            let slot = &mut callbacks[decl.kind.slot()];
            if slot.is_some() {
                return Err(RegistrationError::annotation(
                    &self.name,
                    format!("{} declared more than once", decl.kind),
                ));
            }
            let plan = compile(&self.name, &template, decl.kind, &decl.params)?;
            check_return(&self.name, decl.kind, &decl.returns)?;
            *slot = Some(Callback {
                kind: decl.kind,
                plan,
                returns: decl.returns,
                handler: decl.handler,
            });
        }

        Ok(Endpoint {
            name: self.name,
            template,
            callbacks,
        })
    }
}

impl fmt::Debug for EndpointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDefinition")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field(
                "callbacks",
                &self.callbacks.iter().map(|c| c.kind).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Validates a definition. Same as [`EndpointDefinition::validate`].
pub fn validate(definition: EndpointDefinition) -> RegistrationResult<Endpoint> {
    definition.validate()
}

/// How many of one parameter kind a callback may declare.
#[derive(Clone, Copy)]
enum Arity {
    Forbidden,
    Optional,
    Required,
}

/// The primary payload rule for each callback kind.
fn primary_rule(kind: CallbackKind) -> (Arity, &'static str) {
    match kind {
        CallbackKind::Open => (Arity::Forbidden, "payload"),
        CallbackKind::Text => (Arity::Required, "text payload"),
        CallbackKind::Binary => (Arity::Required, "binary payload"),
        CallbackKind::Pong => (Arity::Required, "pong payload"),
        CallbackKind::Close => (Arity::Optional, "close reason"),
        CallbackKind::Error => (Arity::Required, "error"),
    }
}

fn compile(
    endpoint: &str,
    template: &RouteTemplate,
    kind: CallbackKind,
    params: &[ParamDecl],
) -> RegistrationResult<Vec<Binding>> {
    let shape_error =
        |reason: String| RegistrationError::parameter_shape(endpoint, kind.to_string(), reason);

    let mut plan = Vec::with_capacity(params.len());
    let mut primaries = 0usize;
    let mut flags = 0usize;

    for param in params {
        let binding = match (kind, param) {
            (_, ParamDecl::Session) => Binding::Session,
            (_, ParamDecl::PathParam(name)) => {
                if !template.has_variable(name) {
                    return Err(shape_error(format!(
                        "path parameter {name} is not a variable of {}",
                        template.as_str()
                    )));
                }
                Binding::PathVariable(name.clone())
            }
            (CallbackKind::Text, ParamDecl::Text) => Binding::Text,
            (CallbackKind::Binary, ParamDecl::Bytes) => Binding::Bytes,
            (CallbackKind::Binary, ParamDecl::ByteArray) => Binding::ByteArray,
            (CallbackKind::Binary, ParamDecl::Bool) => Binding::FinalFragment,
            (CallbackKind::Pong, ParamDecl::Pong) => Binding::Pong,
            (CallbackKind::Close, ParamDecl::CloseReason) => Binding::CloseReason,
            (CallbackKind::Error, ParamDecl::Error) => Binding::Error,
            (CallbackKind::Open, ParamDecl::Text) => {
                return Err(shape_error(
                    "unbound string parameters are ambiguous in onOpen".to_owned(),
                ));
            }
            (_, other) => {
                return Err(shape_error(format!("parameter of type {other} is not allowed")));
            }
        };

        match binding {
            Binding::Session | Binding::PathVariable(_) => {}
            Binding::FinalFragment => flags += 1,
            _ => primaries += 1,
        }
        plan.push(binding);
    }

    if flags > 1 {
        return Err(shape_error("more than one final-fragment flag".to_owned()));
    }

    let (arity, what) = primary_rule(kind);
    match arity {
        Arity::Required if primaries == 0 => Err(shape_error(format!("missing {what} parameter"))),
        Arity::Required | Arity::Optional if primaries > 1 => {
            Err(shape_error(format!("more than one {what} parameter")))
        }
        _ => Ok(plan),
    }
}

fn check_return(endpoint: &str, kind: CallbackKind, returns: &ReturnKind) -> RegistrationResult<()> {
    match returns {
        ReturnKind::Other(name) => Err(RegistrationError::parameter_shape(
            endpoint,
            kind.to_string(),
            format!("return type {name} cannot be sent as a frame"),
        )),
        _ => Ok(()),
    }
}

/// One validated callback.
#[derive(Clone)]
pub struct Callback {
    kind: CallbackKind,
    plan: Vec<Binding>,
    returns: ReturnKind,
    handler: Arc<dyn CallbackHandler>,
}

impl Callback {
    /// The event this callback handles.
    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// The compiled binding plan.
    pub fn plan(&self) -> &[Binding] {
        &self.plan
    }

    /// The declared return kind.
    pub fn returns(&self) -> &ReturnKind {
        &self.returns
    }

    /// The handler.
    pub fn handler(&self) -> &Arc<dyn CallbackHandler> {
        &self.handler
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("kind", &self.kind)
            .field("plan", &self.plan)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// A validated endpoint, ready to register.
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    template: RouteTemplate,
    callbacks: [Option<Callback>; 6],
}

impl Endpoint {
    /// The endpoint name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed URI template.
    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    /// The callback for `kind`, if declared.
    pub fn callback(&self, kind: CallbackKind) -> Option<&Callback> {
        self.callbacks[kind.slot()].as_ref()
    }

    /// The declared callback kinds.
    pub fn declared(&self) -> impl Iterator<Item = CallbackKind> + '_ {
        self.callbacks.iter().flatten().map(Callback::kind)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("template", &self.template.as_str())
            .field("callbacks", &self.declared().collect::<Vec<_>>())
            .finish()
    }
}
