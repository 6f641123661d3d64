//! End-to-end WebSocket dispatch scenarios.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::header::{CONNECTION, UPGRADE};
use http::{HeaderMap, HeaderValue};
use tokio::sync::mpsc;

use hermes_core::BoxFuture;
use hermes_ws::{
    CallbackArgs, CallbackKind, CloseCode, CloseReason, EndpointDefinition, EndpointRegistry,
    Frame, ParamDecl, Reply, ReturnKind, Session, SessionId, SessionState, WebSocketDispatcher,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Text(String),
    Binary(Bytes),
}

struct RecordingSession {
    id: SessionId,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSession {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::new(),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn handle(self: &Arc<Self>) -> Arc<dyn Session> {
        self.clone()
    }
}

impl Session for RecordingSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn send_text(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
        self.sent.lock().unwrap().push(Sent::Text(text));
        Box::pin(async { Ok(()) })
    }

    fn send_binary(&self, data: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
        self.sent.lock().unwrap().push(Sent::Binary(data));
        Box::pin(async { Ok(()) })
    }

    fn send_pong(&self, _data: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { anyhow::bail!("pong not supported by this transport") })
    }
}

fn upgrade() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers
}

/// Events observed by the chat endpoint's callbacks.
type Events = mpsc::UnboundedSender<String>;

fn chat_endpoint(events: Events) -> EndpointDefinition {
    let on_open = events.clone();
    let on_text = events.clone();
    let on_close = events.clone();
    let on_error = events;

    EndpointDefinition::new("ChatEndpoint")
        .uri("/chat/{name}")
        .callback(
            CallbackKind::Open,
            [ParamDecl::path("name"), ParamDecl::Session],
            ReturnKind::Void,
            move |args: CallbackArgs| {
                let events = on_open.clone();
                async move {
                    let _ = events.send(format!("open {}", args.text(0).unwrap_or_default()));
                    Ok(Reply::None)
                }
            },
        )
        .callback(
            CallbackKind::Text,
            [ParamDecl::path("name"), ParamDecl::Text, ParamDecl::Session],
            ReturnKind::Text,
            move |args: CallbackArgs| {
                let events = on_text.clone();
                async move {
                    let name = args.text(0).unwrap_or_default().to_owned();
                    let text = args.text(1).unwrap_or_default().to_owned();
                    let has_session = args.session(2).is_some();
                    let _ = events.send(format!("text {name} {text} {has_session}"));
                    if text == "fail" {
                        anyhow::bail!("cannot deliver {text}");
                    }
                    Ok(Reply::text(format!("{name}: {text}")))
                }
            },
        )
        .callback(
            CallbackKind::Binary,
            [ParamDecl::Bytes, ParamDecl::Bool],
            ReturnKind::Bytes,
            |args: CallbackArgs| async move {
                if args.flag(1) == Some(true) {
                    Ok(Reply::binary(Bytes::copy_from_slice(args.bytes(0).unwrap_or_default())))
                } else {
                    Ok(Reply::None)
                }
            },
        )
        .callback(
            CallbackKind::Close,
            [ParamDecl::CloseReason, ParamDecl::path("name")],
            ReturnKind::Void,
            move |args: CallbackArgs| {
                let events = on_close.clone();
                async move {
                    let reason = args.close_reason(0).cloned().unwrap_or_else(CloseReason::normal);
                    let _ = events.send(format!("close {} {}", args.text(1).unwrap_or_default(), reason));
                    Ok(Reply::None)
                }
            },
        )
        .callback(
            CallbackKind::Error,
            [ParamDecl::Session, ParamDecl::Error],
            ReturnKind::Void,
            move |args: CallbackArgs| {
                let events = on_error.clone();
                async move {
                    let message = args.error(1).map(ToString::to_string).unwrap_or_default();
                    let _ = events.send(format!("error {message}"));
                    Ok(Reply::None)
                }
            },
        )
}

fn setup() -> (WebSocketDispatcher, mpsc::UnboundedReceiver<String>) {
    let (events, observed) = mpsc::unbounded_channel();
    let mut registry = EndpointRegistry::new();
    registry.register(chat_endpoint(events)).unwrap();
    (WebSocketDispatcher::with_registry(registry), observed)
}

fn drain(observed: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut events = Vec::new();
    while let Ok(event) = observed.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_chat_text_round_trip() {
    let (dispatcher, mut observed) = setup();
    let alice = RecordingSession::new();

    dispatcher
        .dispatch(Frame::open(alice.handle(), "/chat/alice", upgrade()))
        .await
        .unwrap();
    dispatcher.dispatch(Frame::text(alice.handle(), "hi")).await.unwrap();
    dispatcher.flush(alice.id).await;

    assert_eq!(drain(&mut observed), ["open alice", "text alice hi true"]);
    assert_eq!(alice.sent(), [Sent::Text("alice: hi".into())]);
    assert_eq!(dispatcher.session_state(alice.id), Some(SessionState::Open));
}

#[tokio::test]
async fn test_callback_error_goes_to_on_error_and_session_stays_open() {
    let (dispatcher, mut observed) = setup();
    let bob = RecordingSession::new();

    dispatcher
        .dispatch(Frame::open(bob.handle(), "/chat/bob", upgrade()))
        .await
        .unwrap();
    dispatcher.dispatch(Frame::text(bob.handle(), "fail")).await.unwrap();
    dispatcher.dispatch(Frame::text(bob.handle(), "again")).await.unwrap();
    dispatcher.flush(bob.id).await;

    assert_eq!(
        drain(&mut observed),
        [
            "open bob",
            "text bob fail true",
            "error cannot deliver fail",
            "text bob again true",
        ]
    );
    assert_eq!(bob.sent(), [Sent::Text("bob: again".into())]);
}

#[tokio::test]
async fn test_binary_fragments() {
    let (dispatcher, _observed) = setup();
    let carol = RecordingSession::new();

    dispatcher
        .dispatch(Frame::open(carol.handle(), "/chat/carol", upgrade()))
        .await
        .unwrap();
    dispatcher
        .dispatch(Frame::binary(carol.handle(), &b"part"[..], false))
        .await
        .unwrap();
    dispatcher
        .dispatch(Frame::binary(carol.handle(), &b"last"[..], true))
        .await
        .unwrap();
    dispatcher.flush(carol.id).await;

    assert_eq!(carol.sent(), [Sent::Binary(Bytes::from_static(b"last"))]);
}

#[tokio::test]
async fn test_close_invokes_on_close_and_ends_session() {
    let (dispatcher, mut observed) = setup();
    let dave = RecordingSession::new();

    dispatcher
        .dispatch(Frame::open(dave.handle(), "/chat/dave", upgrade()))
        .await
        .unwrap();
    dispatcher
        .dispatch(Frame::close(
            dave.handle(),
            CloseReason::from_code(CloseCode::GoingAway, "bye"),
        ))
        .await
        .unwrap();
    dispatcher.flush(dave.id).await;

    // The worker removes the session after onClose returns.
    for _ in 0..100 {
        if dispatcher.session_state(dave.id).is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(drain(&mut observed), ["open dave", "close dave 1001 bye"]);
    assert_eq!(dispatcher.session_state(dave.id), None);
    assert!(dispatcher.dispatch(Frame::text(dave.handle(), "late")).await.is_err());
}

#[tokio::test]
async fn test_unsupported_reply_is_routed_to_on_error() {
    let (events, mut observed) = mpsc::unbounded_channel::<String>();
    let mut registry = EndpointRegistry::new();
    registry
        .register(
            EndpointDefinition::new("Ping")
                .uri("/ping")
                .callback(
                    CallbackKind::Text,
                    [ParamDecl::Text],
                    ReturnKind::Void,
                    |_: CallbackArgs| async { Ok(Reply::text("not declared")) },
                )
                .callback(
                    CallbackKind::Error,
                    [ParamDecl::Error],
                    ReturnKind::Void,
                    move |args: CallbackArgs| {
                        let events = events.clone();
                        async move {
                            let _ = events.send(args.error(0).map(ToString::to_string).unwrap_or_default());
                            Ok(Reply::None)
                        }
                    },
                ),
        )
        .unwrap();

    let dispatcher = WebSocketDispatcher::with_registry(registry);
    let eve = RecordingSession::new();
    dispatcher
        .dispatch(Frame::open(eve.handle(), "/ping", upgrade()))
        .await
        .unwrap();
    dispatcher.dispatch(Frame::text(eve.handle(), "x")).await.unwrap();
    dispatcher.flush(eve.id).await;

    assert_eq!(drain(&mut observed), ["onText declared void but returned text"]);
    assert!(eve.sent().is_empty());
}

#[tokio::test]
async fn test_session_survives_endpoint_removal() {
    let (dispatcher, _observed) = setup();
    let frank = RecordingSession::new();

    dispatcher
        .dispatch(Frame::open(frank.handle(), "/chat/frank", upgrade()))
        .await
        .unwrap();

    let mut without = EndpointRegistry::clone(&dispatcher.endpoints().load());
    without.remove("/chat/{name}").unwrap();
    dispatcher.endpoints().store(Arc::new(without));

    dispatcher.dispatch(Frame::text(frank.handle(), "still here")).await.unwrap();
    dispatcher.flush(frank.id).await;
    assert_eq!(frank.sent(), [Sent::Text("frank: still here".into())]);

    let grace = RecordingSession::new();
    let refused = dispatcher
        .dispatch(Frame::open(grace.handle(), "/chat/grace", upgrade()))
        .await
        .unwrap_err();
    assert!(refused.is_handshake_failure());
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let (dispatcher, _observed) = setup();
    let sessions: Vec<_> = (0..8).map(|_| RecordingSession::new()).collect();

    for (i, session) in sessions.iter().enumerate() {
        dispatcher
            .dispatch(Frame::open(session.handle(), format!("/chat/u{i}"), upgrade()))
            .await
            .unwrap();
    }
    for round in 0..5 {
        for session in &sessions {
            dispatcher
                .dispatch(Frame::text(session.handle(), round.to_string()))
                .await
                .unwrap();
        }
    }
    for session in &sessions {
        dispatcher.flush(session.id).await;
    }

    for (i, session) in sessions.iter().enumerate() {
        let expected: Vec<_> = (0..5).map(|r| Sent::Text(format!("u{i}: {r}"))).collect();
        assert_eq!(session.sent(), expected);
    }
}
