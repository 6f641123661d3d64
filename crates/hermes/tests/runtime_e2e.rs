//! End-to-end scenarios through the message processor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT, CONNECTION, UPGRADE};
use http::{HeaderMap, Method, StatusCode};
use http_body_util::BodyExt;

use hermes::prelude::*;
use hermes::ws::SessionState;
use hermes_core::BoxFuture;

#[derive(Default)]
struct Calls {
    handler: AtomicUsize,
    interceptor: AtomicUsize,
}

struct Counting(Arc<Calls>);

impl Interceptor for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn pre_call<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, anyhow::Result<Flow>> {
        self.0.interceptor.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(Flow::Continue) })
    }
}

struct Outbox {
    id: SessionId,
    sent: Mutex<Vec<String>>,
}

impl Outbox {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::new(),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn handle(self: &Arc<Self>) -> Arc<dyn Session> {
        self.clone()
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Session for Outbox {
    fn id(&self) -> SessionId {
        self.id
    }

    fn send_text(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
        self.sent.lock().unwrap().push(text);
        Box::pin(async { Ok(()) })
    }

    fn send_binary(&self, _data: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn send_pong(&self, _data: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn upgrade() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers
}

fn hermes() -> Hermes {
    Hermes::new(HermesConfig::default()).unwrap()
}

fn counted_resource(calls: &Arc<Calls>) -> ResourceMethod {
    let calls = Arc::clone(calls);
    ResourceMethod::builder("listOrders", Method::GET)
        .produces("application/json")
        .handler(move |_: Args| {
            let calls = Arc::clone(&calls);
            async move {
                calls.handler.fetch_add(1, Ordering::SeqCst);
                Ok(Response::with_body(StatusCode::OK, "application/json", "[]"))
            }
        })
        .build()
        .unwrap()
}

fn echo_endpoint() -> EndpointDefinition {
    EndpointDefinition::new("Echo").uri("/echo/{room}").callback(
        CallbackKind::Text,
        [ParamDecl::path("room"), ParamDecl::Text],
        ReturnKind::Text,
        |args: CallbackArgs| async move {
            let room = args.text(0).unwrap_or_default().to_owned();
            let text = args.text(1).unwrap_or_default().to_owned();
            Ok(Reply::text(format!("{room}> {text}")))
        },
    )
}

async fn get(hermes: &Hermes, channel: &str, path: &str, accept: Option<&'static str>) -> Response {
    let mut request = InboundRequest::new(Method::GET, path.parse().unwrap());
    if let Some(accept) = accept {
        request = request.with_header(ACCEPT, HeaderValue::from_static(accept));
    }
    let (responder, response) = Responder::channel();
    hermes
        .processor()
        .submit(InboundMessage::Http {
            channel: channel.into(),
            request,
            responder,
        })
        .await
        .unwrap();
    response.await.unwrap()
}

async fn frame(hermes: &Hermes, channel: &str, frame: Frame) {
    hermes
        .processor()
        .submit(InboundMessage::WebSocket {
            channel: channel.into(),
            frame,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_http_round_trip() {
    let hermes = hermes();
    let calls = Arc::new(Calls::default());
    hermes
        .channel(&"http".into())
        .register_resource("/orders", counted_resource(&calls))
        .unwrap();

    let response = get(&hermes, "http", "/orders", Some("application/json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"[]"));
    assert_eq!(calls.handler.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unregistered_path_calls_nothing() {
    let hermes = hermes();
    let calls = Arc::new(Calls::default());
    let registry = hermes.channel(&"http".into());
    registry.register_resource("/orders", counted_resource(&calls)).unwrap();
    registry.register_interceptor(Arc::new(Counting(Arc::clone(&calls))));

    let response = get(&hermes, "http", "/customers", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.handler.load(Ordering::SeqCst), 0);
    assert_eq!(calls.interceptor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unacceptable_is_rejected_before_invocation() {
    let hermes = hermes();
    let calls = Arc::new(Calls::default());
    hermes
        .channel(&"http".into())
        .register_resource("/orders", counted_resource(&calls))
        .unwrap();

    let response = get(&hermes, "http", "/orders", Some("text/html")).await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(calls.handler.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_channels_do_not_share_routes() {
    let hermes = hermes();
    let calls = Arc::new(Calls::default());
    hermes
        .channel(&"public".into())
        .register_resource("/orders", counted_resource(&calls))
        .unwrap();
    hermes.channel(&"admin".into());

    assert_eq!(get(&hermes, "public", "/orders", None).await.status(), StatusCode::OK);
    assert_eq!(
        get(&hermes, "admin", "/orders", None).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(&hermes, "nowhere", "/orders", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_register_remove_register_is_idempotent() {
    let hermes = hermes();
    let calls = Arc::new(Calls::default());
    let registry = hermes.channel(&"http".into());

    registry.register_resource("/orders", counted_resource(&calls)).unwrap();
    registry.remove_resource("/orders").unwrap();
    assert!(!registry.has_resource("/orders"));
    assert!(registry.remove_resource("/orders").unwrap().is_none());

    registry.register_resource("/orders", counted_resource(&calls)).unwrap();
    assert_eq!(get(&hermes, "http", "/orders", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_endpoint_is_never_routable() {
    let hermes = hermes();
    let registry = hermes.channel(&"ws".into());

    let invalid = EndpointDefinition::new("Broken").uri("/broken/{id}").callback(
        CallbackKind::Text,
        [ParamDecl::path("other"), ParamDecl::Text],
        ReturnKind::Void,
        |_: CallbackArgs| async { Ok(Reply::None) },
    );
    let err = registry.register_websocket_endpoint(invalid).unwrap_err();
    assert!(matches!(err, RegistrationError::ParameterShape { .. }));
    assert!(registry.lookup_endpoint("/broken/1").is_none());

    let session = Outbox::new();
    frame(&hermes, "ws", Frame::open(session.handle(), "/broken/1", upgrade())).await;
    assert_eq!(registry.ws().session_count(), 0);
}

#[tokio::test]
async fn test_websocket_through_processor() {
    let hermes = hermes();
    let registry = hermes.channel(&"ws".into());
    registry.register_websocket_endpoint(echo_endpoint()).unwrap();

    let session = Outbox::new();
    frame(&hermes, "ws", Frame::open(session.handle(), "/echo/lobby", upgrade())).await;
    for text in ["one", "two", "three"] {
        frame(&hermes, "ws", Frame::text(session.handle(), text)).await;
    }
    registry.ws().flush(session.id).await;

    assert_eq!(session.sent(), ["lobby> one", "lobby> two", "lobby> three"]);
    assert_eq!(registry.ws().session_state(session.id), Some(SessionState::Open));

    frame(&hermes, "ws", Frame::close(session.handle(), CloseReason::normal())).await;
    registry.ws().flush(session.id).await;
    tokio::task::yield_now().await;
    assert!(registry.ws().session_state(session.id).is_none());
}

#[tokio::test]
async fn test_removing_channel_disconnects_when_configured() {
    let mut config = HermesConfig::default();
    config.websocket.disconnect_on_remove = true;
    let hermes = Hermes::new(config).unwrap();
    let registry = hermes.channel(&"ws".into());
    registry.register_websocket_endpoint(echo_endpoint()).unwrap();

    let session = Outbox::new();
    frame(&hermes, "ws", Frame::open(session.handle(), "/echo/lobby", upgrade())).await;
    assert_eq!(registry.ws().session_count(), 1);

    hermes.channels().remove(&"ws".into());
    assert_eq!(registry.ws().session_count(), 0);
    assert!(hermes.channels().get(&"ws".into()).is_none());
}

#[tokio::test]
async fn test_permits_are_released_after_dispatch() {
    let hermes = hermes();
    let calls = Arc::new(Calls::default());
    hermes
        .channel(&"http".into())
        .register_resource("/orders", counted_resource(&calls))
        .unwrap();

    let before = hermes.processor().available_permits();
    for _ in 0..10 {
        get(&hermes, "http", "/orders", None).await;
    }
    tokio::task::yield_now().await;
    assert_eq!(hermes.processor().available_permits(), before);
}
