//! Error types for Hermes.
//!
//! Dispatch failures are described by [`DispatchError`], whose variants map
//! one-to-one onto the status codes clients observe:
//!
//! | Variant | Status | Body |
//! |---|---|---|
//! | `RouteNotFound` | 404 | diagnostic text |
//! | `MethodNotAllowed` | 405 | diagnostic text, `Allow` header |
//! | `UnsupportedMediaType` | 415 | diagnostic text |
//! | `NotAcceptable` | 406 | diagnostic text |
//! | `Handler` | carried | carried |
//! | `UnmappedHandlerThrowable` | 500 | `Exception occurred: <message>` |
//! | `Interceptor` | 500 | empty |
//!
//! Registration failures are described by [`RegistrationError`]; they are
//! always fail-closed.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, ALLOW};
use http::{Method, StatusCode};
use http_body_util::Full;
use thiserror::Error;

use hermes_router::RouterError;

use crate::types::{Response, ResponseExt};

/// Result type alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type alias for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// A domain error that carries its own fully formed response.
///
/// Handlers and interceptors return this (wrapped in `anyhow::Error`) when
/// they want a specific failure delivered verbatim. It is never passed to
/// exception mappers.
///
/// # Example
///
/// ```
/// use hermes_core::HandlerException;
/// use http::StatusCode;
///
/// let err = HandlerException::new(StatusCode::CONFLICT, "already exists");
/// let response = err.to_response();
/// assert_eq!(response.status(), StatusCode::CONFLICT);
/// ```
#[derive(Debug, Clone, Error)]
#[error("handler exception ({status})")]
pub struct HandlerException {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HandlerException {
    /// A failure response with a text body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::from_response(&Response::text(status, "")).with_body(body)
    }

    /// Captures the status and headers of `response` with an empty body.
    pub fn from_response(response: &Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: Bytes::new(),
        }
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The status code of the carried response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Renders the carried response.
    pub fn to_response(&self) -> Response {
        let mut response = http::Response::new(Full::new(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Failures raised while dispatching an HTTP request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No template matches the request path.
    #[error("no resource found for path {path}")]
    RouteNotFound {
        /// The request path.
        path: String,
    },

    /// A template matches the path but not the HTTP method.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        /// The request method.
        method: Method,
        /// Methods the matched path does accept.
        allowed: Vec<Method>,
    },

    /// The request content type matches none of the consumed types.
    #[error("unsupported media type {content_type}")]
    UnsupportedMediaType {
        /// The request content type.
        content_type: String,
    },

    /// None of the produced types is acceptable to the client.
    #[error("no acceptable media type for {accept}")]
    NotAcceptable {
        /// The client's accept list.
        accept: String,
    },

    /// A handler or interceptor raised a [`HandlerException`].
    #[error(transparent)]
    Handler(#[from] HandlerException),

    /// A handler failed with an error no exception mapper claims.
    #[error("Exception occurred: {0}")]
    UnmappedHandlerThrowable(#[source] anyhow::Error),

    /// An interceptor failed.
    #[error("interceptor {interceptor} failed: {source}")]
    Interceptor {
        /// Name of the failing interceptor.
        interceptor: String,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Creates a route-not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::RouteNotFound { path: path.into() }
    }

    /// Creates a method-not-allowed error.
    pub fn method_not_allowed(method: Method, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed { method, allowed }
    }

    /// Creates an unsupported-media-type error.
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    /// Creates a not-acceptable error.
    pub fn not_acceptable(accept: impl Into<String>) -> Self {
        Self::NotAcceptable {
            accept: accept.into(),
        }
    }

    /// Creates an unmapped-throwable error.
    pub fn unmapped(source: anyhow::Error) -> Self {
        Self::UnmappedHandlerThrowable(source)
    }

    /// Creates an interceptor error.
    pub fn interceptor(interceptor: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Interceptor {
            interceptor: interceptor.into(),
            source,
        }
    }

    /// Returns the status code this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::Handler(e) => e.status(),
            Self::UnmappedHandlerThrowable(_) | Self::Interceptor { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns true for failures resolved before any handler runs.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::RouteNotFound { .. }
                | Self::MethodNotAllowed { .. }
                | Self::UnsupportedMediaType { .. }
                | Self::NotAcceptable { .. }
        )
    }

    /// Renders the terminal response for this failure.
    pub fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Handler(e) => e.to_response(),
            Self::Interceptor { .. } => Response::empty(status),
            Self::MethodNotAllowed { ref allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut response = Response::text(status, self.to_string());
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
                response
            }
            other => Response::text(status, other.to_string()),
        }
    }
}

/// Failures raised while registering resources or endpoints.
///
/// A registration that fails with any of these leaves the registry
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The endpoint lacks a required declaration, such as its URI template,
    /// or declares something twice.
    #[error("endpoint {endpoint}: {reason}")]
    Annotation {
        /// Name of the endpoint.
        endpoint: String,
        /// What is missing or repeated.
        reason: String,
    },

    /// A callback's parameters violate the rules for its kind.
    #[error("endpoint {endpoint}, callback {callback}: {reason}")]
    ParameterShape {
        /// Name of the endpoint.
        endpoint: String,
        /// The callback kind (`onOpen`, `onText`, ...).
        callback: String,
        /// Which rule was violated.
        reason: String,
    },

    /// The template clashes with one already registered, or is malformed.
    #[error(transparent)]
    Route(#[from] RouterError),

    /// An HTTP resource method is inconsistent.
    #[error("resource {resource}: {reason}")]
    InvalidResource {
        /// Name of the resource method.
        resource: String,
        /// What is inconsistent.
        reason: String,
    },
}

impl RegistrationError {
    /// Create an annotation error.
    pub fn annotation(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Annotation {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a parameter shape error.
    pub fn parameter_shape(
        endpoint: impl Into<String>,
        callback: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ParameterShape {
            endpoint: endpoint.into(),
            callback: callback.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResource {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the template is already taken.
    pub fn is_duplicate_route(&self) -> bool {
        matches!(self, Self::Route(RouterError::DuplicateRoute { .. }))
    }
}
