//! Per-request context handed to interceptors and handlers.

use http::header::{HeaderMap, HeaderName};
use http::{Method, Uri};
use uuid::Uuid;

use hermes_core::MediaType;
use hermes_router::Params;

use crate::request::InboundRequest;

/// What the dispatcher knows about a request once it has been routed and
/// negotiated.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Params,
    response_type: MediaType,
}

impl RequestContext {
    /// Captures the routed request.
    pub fn new(request: &InboundRequest, params: Params, response_type: MediaType) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            params,
            response_type,
        }
    }

    /// Unique ID of this dispatch.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Variables captured by the matched template.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The negotiated response media type.
    pub fn response_type(&self) -> &MediaType {
        &self.response_type
    }

    /// A captured path variable.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The first value of a header, if it is valid visible ASCII.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The first decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }
}
