//! Common types shared by the dispatchers.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The response type produced by every dispatch path.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Content type used for generated diagnostic bodies.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Extension trait for building responses without a fallible builder.
pub trait ResponseExt {
    /// A response with the given status and no body.
    fn empty(status: StatusCode) -> Response;

    /// A response with a body and no content type.
    fn bytes(status: StatusCode, body: impl Into<Bytes>) -> Response;

    /// A `text/plain` response.
    fn text(status: StatusCode, body: impl Into<String>) -> Response;

    /// A response with a body and an explicit content type.
    fn with_body(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        Self::bytes(status, Bytes::new())
    }

    fn bytes(status: StatusCode, body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
    }

    fn text(status: StatusCode, body: impl Into<String>) -> Response {
        Self::with_body(status, TEXT_PLAIN_UTF8, body.into())
    }

    fn with_body(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        response
    }
}
