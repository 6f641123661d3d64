//! End-to-end tests for the HTTP dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use http::header::{HeaderValue, ACCEPT, ALLOW, CONTENT_TYPE};
use http::{Method, StatusCode, Uri};
use http_body_util::BodyExt;

use hermes_core::{BoxFuture, HandlerException, Response, ResponseExt};
use hermes_http::{
    Args, Flow, HttpDispatcher, HttpRoutes, InboundRequest, Interceptor, ParamBinding,
    RequestContext, ResourceMethod, StreamingHandler,
};

#[derive(Debug, thiserror::Error)]
#[error("order {0} not found")]
struct OrderNotFound(u32);

#[derive(Default)]
struct Counters {
    handler: AtomicUsize,
    pre: AtomicUsize,
    post: AtomicUsize,
}

struct Counting {
    counters: Arc<Counters>,
}

impl Interceptor for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn pre_call<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, anyhow::Result<Flow>> {
        self.counters.pre.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(Flow::Continue) })
    }

    fn post_call<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _status: StatusCode,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        self.counters.post.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

struct Gate {
    allow: bool,
}

impl Interceptor for Gate {
    fn name(&self) -> &str {
        "gate"
    }

    fn pre_call<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, anyhow::Result<Flow>> {
        let allow = self.allow || ctx.header(&http::header::AUTHORIZATION).is_some();
        Box::pin(async move {
            if allow {
                Ok(Flow::Continue)
            } else {
                Ok(Flow::ShortCircuit(Response::text(
                    StatusCode::UNAUTHORIZED,
                    "login required",
                )))
            }
        })
    }
}

struct Broken;

impl Interceptor for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn pre_call<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async { Err(anyhow::anyhow!("policy store unreachable")) })
    }
}

struct BrokenAudit;

impl Interceptor for BrokenAudit {
    fn name(&self) -> &str {
        "audit"
    }

    fn pre_call<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, anyhow::Result<Flow>> {
        Box::pin(async { Ok(Flow::Continue) })
    }

    fn post_call<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _status: StatusCode,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Err(anyhow::anyhow!("audit log full")) })
    }
}

struct Upload {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    name: String,
}

impl StreamingHandler for Upload {
    fn chunk(&mut self, chunk: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
        self.chunks.lock().unwrap().push(chunk);
        Box::pin(async { Ok(()) })
    }

    fn end(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<Response>> {
        let total: usize = self.chunks.lock().unwrap().iter().map(Bytes::len).sum();
        let body = format!("{} {total}", self.name);
        Box::pin(async move { Ok(Response::text(StatusCode::CREATED, body)) })
    }
}

fn orders(counters: &Arc<Counters>) -> HttpRoutes {
    let mut routes = HttpRoutes::new();

    let seen = Arc::clone(counters);
    routes
        .register_resource(
            "/orders/{id}",
            ResourceMethod::builder("getOrder", Method::GET)
                .produces("application/json")
                .produces("text/plain")
                .bind(ParamBinding::path("id"))
                .handler(move |args: Args| {
                    seen.handler.fetch_add(1, Ordering::SeqCst);
                    let id: u32 = args.text(0).and_then(|v| v.parse().ok()).unwrap_or(0);
                    async move {
                        match id {
                            0 => Err(anyhow::Error::new(OrderNotFound(id))),
                            13 => Err(HandlerException::new(StatusCode::GONE, "order archived").into()),
                            99 => Err(anyhow::anyhow!("database offline")),
                            _ => Ok(Response::bytes(StatusCode::OK, format!("order {id}"))),
                        }
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let seen = Arc::clone(counters);
    routes
        .register_resource(
            "/orders/{id}",
            ResourceMethod::builder("updateOrder", Method::PUT)
                .consumes("application/json")
                .bind(ParamBinding::path("id"))
                .bind(ParamBinding::Body)
                .bind(ParamBinding::query("dryRun"))
                .handler(move |args: Args| {
                    seen.handler.fetch_add(1, Ordering::SeqCst);
                    let body = args.body(1).cloned().unwrap_or_default();
                    let dry_run = args.text(2) == Some("true");
                    async move {
                        let status = if dry_run { StatusCode::ACCEPTED } else { StatusCode::OK };
                        Ok(Response::with_body(status, "application/json", body))
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    routes.register_exception_mapper(|e: &OrderNotFound| {
        Response::text(StatusCode::NOT_FOUND, e.to_string())
    });
    routes
}

fn get(uri: &'static str) -> InboundRequest {
    InboundRequest::new(Method::GET, Uri::from_static(uri))
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_unregistered_path_is_404_without_invocations() {
    let counters = Arc::new(Counters::default());
    let mut routes = orders(&counters);
    routes.register_interceptor(Arc::new(Counting {
        counters: Arc::clone(&counters),
    }));
    let dispatcher = HttpDispatcher::with_routes(routes);

    let response = dispatcher.dispatch(get("/customers/1")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(counters.handler.load(Ordering::SeqCst), 0);
    assert_eq!(counters.pre.load(Ordering::SeqCst), 0);
    assert_eq!(counters.post.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_acceptable_type_is_406_before_invocation() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let request = get("/orders/5").with_header(ACCEPT, HeaderValue::from_static("image/png"));
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(counters.handler.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_success_sets_negotiated_content_type() {
    let counters = Arc::new(Counters::default());
    let mut routes = orders(&counters);
    routes.register_interceptor(Arc::new(Counting {
        counters: Arc::clone(&counters),
    }));
    let dispatcher = HttpDispatcher::with_routes(routes);

    let request = get("/orders/5").with_header(ACCEPT, HeaderValue::from_static("text/plain, */*"));
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    assert_eq!(body_text(response).await, "order 5");
    assert_eq!(counters.pre.load(Ordering::SeqCst), 1);
    assert_eq!(counters.post.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wrong_method_is_405_with_allow() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let request = InboundRequest::new(Method::DELETE, Uri::from_static("/orders/5"));
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(ALLOW).unwrap(), "GET, PUT");
}

#[tokio::test]
async fn test_unsupported_content_type_is_415() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let request = InboundRequest::new(Method::PUT, Uri::from_static("/orders/5"))
        .with_header(CONTENT_TYPE, HeaderValue::from_static("text/xml"))
        .with_body("<order/>");
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(counters.handler.load(Ordering::SeqCst), 0);
}

fn echo() -> HttpRoutes {
    let mut routes = HttpRoutes::new();
    routes
        .register_resource(
            "/echo",
            ResourceMethod::builder("echo", Method::POST)
                .bind(ParamBinding::Body)
                .handler(|args: Args| {
                    let body = args.body(0).cloned().unwrap_or_default();
                    async move { Ok(Response::bytes(StatusCode::OK, body)) }
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    routes
}

#[tokio::test]
async fn test_malformed_content_type_reaches_method_without_consumes() {
    let dispatcher = HttpDispatcher::with_routes(echo());

    let request = InboundRequest::new(Method::POST, Uri::from_static("/echo"))
        .with_header(CONTENT_TYPE, HeaderValue::from_static("garbage"))
        .with_body("ping");
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ping");
}

#[tokio::test]
async fn test_wrong_method_with_malformed_content_type_is_405() {
    let dispatcher = HttpDispatcher::with_routes(echo());

    let request = InboundRequest::new(Method::GET, Uri::from_static("/echo"))
        .with_header(CONTENT_TYPE, HeaderValue::from_static("garbage"));
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(ALLOW).unwrap(), "POST");
}

#[tokio::test]
async fn test_malformed_content_type_against_consumes_is_415() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let request = InboundRequest::new(Method::PUT, Uri::from_static("/orders/5"))
        .with_header(CONTENT_TYPE, HeaderValue::from_static("garbage"))
        .with_body("{}");
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(counters.handler.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparseable_accept_is_treated_as_any() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let request = get("/orders/5").with_header(ACCEPT, HeaderValue::from_static("json"));
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    assert_eq!(counters.handler.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_body_and_query_binding() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let request = InboundRequest::new(Method::PUT, Uri::from_static("/orders/5?dryRun=true"))
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_chunks(stream::iter(vec![Ok(Bytes::from("{\"qty\":")), Ok(Bytes::from("2}"))]).boxed());
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_text(response).await, "{\"qty\":2}");
}

#[tokio::test]
async fn test_handler_exception_is_verbatim() {
    let counters = Arc::new(Counters::default());
    let mut routes = orders(&counters);
    routes.register_exception_mapper(|_: &HandlerException| Response::empty(StatusCode::IM_A_TEAPOT));
    let dispatcher = HttpDispatcher::with_routes(routes);

    let response = dispatcher.dispatch(get("/orders/13")).await;

    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_text(response).await, "order archived");
}

#[tokio::test]
async fn test_mapped_error() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let response = dispatcher.dispatch(get("/orders/0")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "order 0 not found");
}

#[tokio::test]
async fn test_unmapped_error_is_generic_500() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));

    let response = dispatcher.dispatch(get("/orders/99")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Exception occurred: database offline");
}

#[tokio::test]
async fn test_short_circuit_skips_handler_and_post() {
    let counters = Arc::new(Counters::default());
    let mut routes = orders(&counters);
    routes.register_interceptor(Arc::new(Gate { allow: false }));
    routes.register_interceptor(Arc::new(Counting {
        counters: Arc::clone(&counters),
    }));
    let dispatcher = HttpDispatcher::with_routes(routes);

    let response = dispatcher.dispatch(get("/orders/5")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(counters.handler.load(Ordering::SeqCst), 0);
    assert_eq!(counters.pre.load(Ordering::SeqCst), 0);
    assert_eq!(counters.post.load(Ordering::SeqCst), 0);

    let authorized = get("/orders/5")
        .with_header(http::header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
    assert_eq!(dispatcher.dispatch(authorized).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_interceptor_error_is_empty_500() {
    let counters = Arc::new(Counters::default());
    let mut routes = orders(&counters);
    routes.register_interceptor(Arc::new(Broken));
    routes.register_exception_mapper(|_: &OrderNotFound| Response::empty(StatusCode::IM_A_TEAPOT));
    let dispatcher = HttpDispatcher::with_routes(routes);

    let response = dispatcher.dispatch(get("/orders/5")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.is_empty());
    assert_eq!(counters.handler.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_post_interceptor_error_replaces_response() {
    let counters = Arc::new(Counters::default());
    let mut routes = orders(&counters);
    routes.register_interceptor(Arc::new(BrokenAudit));
    let dispatcher = HttpDispatcher::with_routes(routes);

    let response = dispatcher.dispatch(get("/orders/5")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.is_empty());
    assert_eq!(counters.handler.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_streaming_handler_receives_chunks() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let mut routes = HttpRoutes::new();
    routes
        .register_resource(
            "/uploads/{name}",
            ResourceMethod::builder("upload", Method::POST)
                .bind(ParamBinding::path("name"))
                .streaming(move |args: Args| -> Box<dyn StreamingHandler> {
                    Box::new(Upload {
                        chunks: Arc::clone(&sink),
                        name: args.text(0).unwrap_or_default().to_owned(),
                    })
                })
                .build()
                .unwrap(),
        )
        .unwrap();
    let dispatcher = HttpDispatcher::with_routes(routes);

    let chunks = vec![Ok(Bytes::from("abc")), Ok(Bytes::from("de")), Ok(Bytes::from("f"))];
    let request = InboundRequest::new(Method::POST, Uri::from_static("/uploads/report.csv"))
        .with_chunks(stream::iter(chunks).boxed());
    let response = dispatcher.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "report.csv 6");
    assert_eq!(received.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_request_released_once_on_every_path() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(orders(&counters));
    let released = Arc::new(AtomicUsize::new(0));

    for uri in ["/orders/5", "/nowhere", "/orders/99", "/orders/13"] {
        let counter = Arc::clone(&released);
        let request = InboundRequest::new(Method::GET, Uri::from_static(uri)).on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let _ = dispatcher.dispatch(request).await;
    }

    assert_eq!(released.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_registration_is_visible_to_next_dispatch() {
    let counters = Arc::new(Counters::default());
    let dispatcher = HttpDispatcher::with_routes(HttpRoutes::new());
    assert_eq!(dispatcher.dispatch(get("/orders/5")).await.status(), StatusCode::NOT_FOUND);

    dispatcher.routes().store(Arc::new(orders(&counters)));
    assert_eq!(dispatcher.dispatch(get("/orders/5")).await.status(), StatusCode::OK);
}
