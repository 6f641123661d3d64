//! The inbound request abstraction.
//!
//! The transport hands the dispatcher an [`InboundRequest`]: method, URI,
//! headers and a body that is either whole or a stream of chunks. An optional
//! release hook runs exactly once when the request is dropped, whichever way
//! dispatch ended.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, Uri};

/// A request body.
pub enum RequestBody {
    /// The whole body, already read.
    Full(Bytes),
    /// Body chunks in arrival order.
    Chunked(BoxStream<'static, anyhow::Result<Bytes>>),
}

impl RequestBody {
    /// An empty body.
    pub fn empty() -> Self {
        Self::Full(Bytes::new())
    }

    /// Reads the whole body.
    pub async fn collect(self) -> anyhow::Result<Bytes> {
        match self {
            Self::Full(bytes) => Ok(bytes),
            Self::Chunked(chunks) => {
                let buf = chunks
                    .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                        buf.extend_from_slice(&chunk);
                        Ok(buf)
                    })
                    .await?;
                Ok(buf.freeze())
            }
        }
    }

    /// Turns the body into a chunk stream. A whole body is one chunk, and an
    /// empty one is no chunk at all.
    pub fn into_stream(self) -> BoxStream<'static, anyhow::Result<Bytes>> {
        match self {
            Self::Full(bytes) if bytes.is_empty() => stream::empty().boxed(),
            Self::Full(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            Self::Chunked(chunks) => chunks,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Chunked(_) => f.write_str("Chunked"),
        }
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// An HTTP request as delivered by the transport.
///
/// # Example
///
/// ```
/// use hermes_http::InboundRequest;
/// use http::Method;
///
/// let request = InboundRequest::new(Method::GET, "/users/7?verbose=true".parse().unwrap())
///     .with_header(http::header::ACCEPT, "application/json".parse().unwrap());
///
/// assert_eq!(request.path(), "/users/7");
/// assert_eq!(request.header_str(&http::header::ACCEPT), Some("application/json"));
/// ```
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: RequestBody,
    release: Option<ReleaseHook>,
}

impl InboundRequest {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: RequestBody::empty(),
            release: None,
        }
    }

    /// Adopts an `http::Request` with a whole body.
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: RequestBody::Full(body),
            release: None,
        }
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets a whole body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Full(body.into());
        self
    }

    /// Sets a chunked body.
    #[must_use]
    pub fn with_chunks(mut self, chunks: BoxStream<'static, anyhow::Result<Bytes>>) -> Self {
        self.body = RequestBody::Chunked(chunks);
        self
    }

    /// Registers a hook to run when the request is released.
    #[must_use]
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The URI path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of `name`, if it is valid visible ASCII.
    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Takes the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> RequestBody {
        std::mem::replace(&mut self.body, RequestBody::empty())
    }
}

impl Drop for InboundRequest {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for InboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
