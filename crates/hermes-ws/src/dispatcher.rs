//! The WebSocket dispatcher.
//!
//! Each session moves through
//!
//! ```text
//! HANDSHAKING ─▶ OPEN ─▶ CLOSING ─▶ CLOSED
//! ```
//!
//! An open frame resolves the endpoint and starts a worker task that owns
//! the session's frame queue. Every later frame for the session is pushed
//! onto that queue, so callbacks for one session run one at a time in
//! arrival order while different sessions run concurrently.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use http::HeaderMap;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error};

use hermes_router::Params;
use hermes_telemetry::metrics::{record_ws_error, record_ws_frame, InFlightGuard};

use crate::endpoint::{CallbackArgs, CallbackKind, Endpoint, Payload, Reply};
use crate::error::{WsError, WsResult};
use crate::frame::{check_upgrade, Frame, FrameKind};
use crate::registry::EndpointRegistry;
use crate::session::{Session, SessionId};

/// Default depth of a session's frame queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The endpoint is resolved and `onOpen` has not finished yet.
    Handshaking,
    /// Frames are being delivered.
    Open,
    /// A close frame was received.
    Closing,
    /// `onClose` has run.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Handshaking => "HANDSHAKING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

enum Job {
    Frame(FrameKind),
    Flush(oneshot::Sender<()>),
}

struct SessionEntry {
    state: SessionState,
    endpoint: Arc<Endpoint>,
    queue: mpsc::Sender<Job>,
}

type Sessions = Arc<DashMap<SessionId, SessionEntry>>;

/// Dispatches WebSocket frames against a swappable [`EndpointRegistry`].
///
/// A session keeps the endpoint it opened on even if the endpoint is
/// removed from the registry afterwards.
#[derive(Clone)]
pub struct WebSocketDispatcher {
    endpoints: Arc<ArcSwap<EndpointRegistry>>,
    sessions: Sessions,
    queue_capacity: usize,
    limiter: Option<Arc<Semaphore>>,
}

impl WebSocketDispatcher {
    /// Creates a dispatcher over a shared registry.
    pub fn new(endpoints: Arc<ArcSwap<EndpointRegistry>>) -> Self {
        Self {
            endpoints,
            sessions: Arc::new(DashMap::new()),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            limiter: None,
        }
    }

    /// Creates a dispatcher that owns a fixed registry.
    pub fn with_registry(registry: EndpointRegistry) -> Self {
        Self::new(Arc::new(ArcSwap::from_pointee(registry)))
    }

    /// Sets the depth of each session's frame queue. Zero is raised to one.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Makes every callback invocation hold a permit of `limiter`.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// The shared registry.
    pub fn endpoints(&self) -> &Arc<ArcSwap<EndpointRegistry>> {
        &self.endpoints
    }

    /// Accepts one inbound frame.
    ///
    /// Open frames are resolved immediately; a refused handshake returns an
    /// error and creates no session. Every other frame is queued on its
    /// session and handled later by the session's worker. Callback failures
    /// never surface here.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn dispatch(&self, frame: Frame) -> WsResult<()> {
        let Frame { session, kind } = frame;
        record_ws_frame(kind.label());
        match kind {
            FrameKind::Open { uri, headers } => self.open(session, uri, headers).await,
            other => self.enqueue(session.id(), other).await,
        }
    }

    /// Resolves once every frame queued for `id` so far has been handled.
    pub async fn flush(&self, id: SessionId) {
        let Some(queue) = self.sessions.get(&id).map(|e| e.queue.clone()) else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if queue.send(Job::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    /// Forgets a session whose connection dropped without a close frame.
    ///
    /// Frames already queued are still handled; `onClose` is not invoked.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Session disconnected");
        }
        removed
    }

    /// Forgets every session. Returns how many were live.
    pub fn disconnect_all(&self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        if count > 0 {
            debug!(count, "Sessions disconnected");
        }
        count
    }

    /// The state of a session, if it is known.
    pub fn session_state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.get(&id).map(|e| e.state)
    }

    /// The name of the endpoint a session is bound to.
    pub fn session_endpoint(&self, id: SessionId) -> Option<String> {
        self.sessions.get(&id).map(|e| e.endpoint.name().to_owned())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    async fn open(
        &self,
        session: Arc<dyn Session>,
        uri: String,
        headers: HeaderMap,
    ) -> WsResult<()> {
        let id = session.id();
        if let Err(err) = check_upgrade(&headers) {
            debug!(session_id = %id, uri = %uri, error = %err, "Open frame ignored");
            return Err(err);
        }

        let (endpoint, params) = {
            let registry = self.endpoints.load();
            let Some(found) = registry.lookup(&uri) else {
                debug!(session_id = %id, uri = %uri, "Handshake refused, no endpoint");
                return Err(WsError::endpoint_not_found(uri));
            };
            (Arc::clone(found.destination), found.params)
        };

        let (queue, jobs) = mpsc::channel(self.queue_capacity);
        match self.sessions.entry(id) {
            Entry::Occupied(_) => return Err(WsError::session_exists(id)),
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    state: SessionState::Handshaking,
                    endpoint: Arc::clone(&endpoint),
                    queue: queue.clone(),
                });
            }
        }

        debug!(
            session_id = %id,
            endpoint = endpoint.name(),
            template = endpoint.template().as_str(),
            state = %SessionState::Handshaking,
            "Session opening"
        );

        let worker = SessionWorker {
            id,
            session,
            endpoint,
            params,
            sessions: Arc::clone(&self.sessions),
            limiter: self.limiter.clone(),
        };
        tokio::spawn(worker.run(jobs));

        queue
            .send(Job::Frame(FrameKind::Open { uri, headers }))
            .await
            .map_err(|_| WsError::session_closed(id))
    }

    async fn enqueue(&self, id: SessionId, kind: FrameKind) -> WsResult<()> {
        let closing = matches!(kind, FrameKind::Close(_));
        let queue = {
            let Some(mut entry) = self.sessions.get_mut(&id) else {
                debug!(session_id = %id, kind = kind.label(), "Frame for unknown session dropped");
                return Err(WsError::session_not_found(id));
            };
            if matches!(entry.state, SessionState::Closing | SessionState::Closed) {
                debug!(
                    session_id = %id,
                    kind = kind.label(),
                    state = %entry.state,
                    "Frame for closing session dropped"
                );
                return Err(WsError::session_closed(id));
            }
            if closing {
                entry.state = SessionState::Closing;
            }
            entry.queue.clone()
        };

        queue
            .send(Job::Frame(kind))
            .await
            .map_err(|_| WsError::session_closed(id))
    }
}

impl fmt::Debug for WebSocketDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketDispatcher")
            .field("endpoints", &self.endpoints.load().len())
            .field("sessions", &self.sessions.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

/// Owns one session's queue and runs its callbacks in order.
struct SessionWorker {
    id: SessionId,
    session: Arc<dyn Session>,
    endpoint: Arc<Endpoint>,
    params: Params,
    sessions: Sessions,
    limiter: Option<Arc<Semaphore>>,
}

impl SessionWorker {
    async fn run(self, mut jobs: mpsc::Receiver<Job>) {
        while let Some(job) = jobs.recv().await {
            match job {
                Job::Flush(done) => {
                    let _ = done.send(());
                }
                Job::Frame(kind) => {
                    let closing = matches!(kind, FrameKind::Close(_));
                    self.handle(kind).await;
                    if closing {
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Closed);
        self.sessions.remove(&self.id);
        debug!(session_id = %self.id, endpoint = self.endpoint.name(), "Session closed");
    }

    async fn handle(&self, kind: FrameKind) {
        let _permit = match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        };
        let _in_flight = InFlightGuard::new();

        let (callback, payload) = match kind {
            FrameKind::Open { .. } => (CallbackKind::Open, Payload::None),
            FrameKind::Text(text) => (CallbackKind::Text, Payload::Text(text)),
            FrameKind::Binary {
                data,
                final_fragment,
            } => (
                CallbackKind::Binary,
                Payload::Binary {
                    data,
                    final_fragment,
                },
            ),
            FrameKind::Pong(data) => (CallbackKind::Pong, Payload::Pong(data)),
            FrameKind::Close(reason) => (CallbackKind::Close, Payload::Close(reason)),
        };

        if let Err(err) = self.invoke(callback, &payload).await {
            self.report(callback, err).await;
        }

        if callback == CallbackKind::Open {
            self.set_state(SessionState::Open);
            debug!(session_id = %self.id, state = %SessionState::Open, "Session open");
        }
    }

    /// Runs one callback and sends its reply. Absent callbacks are no-ops.
    async fn invoke(&self, kind: CallbackKind, payload: &Payload) -> anyhow::Result<()> {
        let Some(callback) = self.endpoint.callback(kind) else {
            return Ok(());
        };

        let args = CallbackArgs::bind(callback.plan(), &self.session, &self.params, payload)?;
        let reply = callback.handler().call(args).await?;
        if !callback.returns().accepts(&reply) {
            return Err(
                WsError::unexpected_reply(kind, callback.returns().clone(), reply.label()).into(),
            );
        }

        match reply {
            Reply::None => Ok(()),
            Reply::Text(text) => self.session.send_text(text).await,
            Reply::Binary(data) => self.session.send_binary(data).await,
            Reply::Pong(data) => self.session.send_pong(data).await,
        }
    }

    async fn report(&self, origin: CallbackKind, err: anyhow::Error) {
        let handled = self.endpoint.callback(CallbackKind::Error).is_some();
        record_ws_error(handled);

        if !handled {
            error!(
                session_id = %self.id,
                endpoint = self.endpoint.name(),
                callback = %origin,
                error = ?err,
                "WebSocket callback failed, frame dropped"
            );
            return;
        }

        let payload = Payload::Error(Arc::new(err));
        if let Err(err) = self.invoke(CallbackKind::Error, &payload).await {
            record_ws_error(false);
            error!(
                session_id = %self.id,
                endpoint = self.endpoint.name(),
                callback = %CallbackKind::Error,
                error = ?err,
                "onError callback failed"
            );
        }
    }

    fn set_state(&self, state: SessionState) {
        if let Some(mut entry) = self.sessions.get_mut(&self.id) {
            // A close frame may already have moved the session on.
            if entry.state == SessionState::Handshaking || state == SessionState::Closed {
                entry.state = state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bytes::Bytes;
    use hermes_core::BoxFuture;
    use http::header::{CONNECTION, UPGRADE};
    use http::HeaderValue;

    use crate::endpoint::{EndpointDefinition, ParamDecl, ReturnKind};
    use crate::frame::CloseReason;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(String),
        Pong(Bytes),
    }

    struct TestSession {
        id: SessionId,
        outbox: Mutex<Vec<Sent>>,
    }

    impl TestSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SessionId::new(),
                outbox: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Sent> {
            self.outbox.lock().unwrap().clone()
        }

        fn push(&self, sent: Sent) -> BoxFuture<'_, anyhow::Result<()>> {
            self.outbox.lock().unwrap().push(sent);
            Box::pin(async { Ok(()) })
        }
    }

    impl Session for TestSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn send_text(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
            self.push(Sent::Text(text))
        }

        fn send_binary(&self, _data: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async { anyhow::bail!("binary frames are not supported") })
        }

        fn send_pong(&self, data: Bytes) -> BoxFuture<'_, anyhow::Result<()>> {
            self.push(Sent::Pong(data))
        }
    }

    fn upgrade_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers
    }

    fn echo_registry() -> EndpointRegistry {
        let mut registry = EndpointRegistry::new();
        registry
            .register(
                EndpointDefinition::new("Echo")
                    .uri("/echo")
                    .callback(
                        CallbackKind::Text,
                        [ParamDecl::Text],
                        ReturnKind::Text,
                        |args: CallbackArgs| async move {
                            Ok(Reply::text(args.text(0).unwrap_or_default()))
                        },
                    )
                    .callback(
                        CallbackKind::Pong,
                        [ParamDecl::Pong],
                        ReturnKind::Pong,
                        |args: CallbackArgs| async move {
                            let data = args.bytes(0).unwrap_or_default();
                            Ok(Reply::Pong(Bytes::copy_from_slice(data)))
                        },
                    ),
            )
            .unwrap();
        registry
    }

    async fn open(dispatcher: &WebSocketDispatcher, session: &Arc<TestSession>) -> Arc<dyn Session> {
        let handle: Arc<dyn Session> = session.clone();
        dispatcher
            .dispatch(Frame::open(Arc::clone(&handle), "/echo", upgrade_headers()))
            .await
            .unwrap();
        handle
    }

    #[tokio::test]
    async fn test_unknown_session_frame_is_rejected() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry());
        let session = TestSession::new();

        let err = dispatcher.dispatch(Frame::text(session, "hi")).await.unwrap_err();
        assert!(matches!(err, WsError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_handshake_without_endpoint_creates_no_session() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry());
        let session = TestSession::new();

        let err = dispatcher
            .dispatch(Frame::open(session, "/nowhere", upgrade_headers()))
            .await
            .unwrap_err();
        assert!(err.is_handshake_failure());
        assert_eq!(dispatcher.session_count(), 0);
    }

    #[tokio::test]
    async fn test_open_without_upgrade_headers_is_ignored() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry());
        let session = TestSession::new();

        let err = dispatcher
            .dispatch(Frame::open(session, "/echo", HeaderMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::NotWebSocketRequest { .. }));
        assert_eq!(dispatcher.session_count(), 0);
    }

    #[tokio::test]
    async fn test_frames_are_handled_in_order() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry()).with_queue_capacity(2);
        let session = TestSession::new();
        let handle = open(&dispatcher, &session).await;

        for i in 0..10 {
            dispatcher
                .dispatch(Frame::text(Arc::clone(&handle), i.to_string()))
                .await
                .unwrap();
        }
        dispatcher.dispatch(Frame::pong(handle, "p")).await.unwrap();
        dispatcher.flush(session.id).await;

        let mut expected: Vec<_> = (0..10).map(|i| Sent::Text(i.to_string())).collect();
        expected.push(Sent::Pong(Bytes::from_static(b"p")));
        assert_eq!(session.sent(), expected);
        assert_eq!(dispatcher.session_state(session.id), Some(SessionState::Open));
        assert_eq!(dispatcher.session_endpoint(session.id).as_deref(), Some("Echo"));
    }

    #[tokio::test]
    async fn test_duplicate_open_is_rejected() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry());
        let session = TestSession::new();
        let handle = open(&dispatcher, &session).await;

        let err = dispatcher
            .dispatch(Frame::open(handle, "/echo", upgrade_headers()))
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::SessionExists { .. }));
    }

    #[tokio::test]
    async fn test_frames_after_close_are_dropped() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry());
        let session = TestSession::new();
        let handle = open(&dispatcher, &session).await;

        dispatcher
            .dispatch(Frame::close(Arc::clone(&handle), CloseReason::normal()))
            .await
            .unwrap();
        assert!(dispatcher.dispatch(Frame::text(handle, "late")).await.is_err());

        dispatcher.flush(session.id).await;
        assert!(session.sent().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_forgets_session() {
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry());
        let session = TestSession::new();
        let handle = open(&dispatcher, &session).await;

        assert!(dispatcher.disconnect(session.id));
        assert!(!dispatcher.disconnect(session.id));
        assert!(dispatcher.dispatch(Frame::text(handle, "x")).await.is_err());
    }

    #[tokio::test]
    async fn test_limiter_permits_are_returned() {
        let limiter = Arc::new(Semaphore::new(1));
        let dispatcher = WebSocketDispatcher::with_registry(echo_registry())
            .with_limiter(Arc::clone(&limiter));
        let session = TestSession::new();
        let handle = open(&dispatcher, &session).await;

        dispatcher.dispatch(Frame::text(handle, "a")).await.unwrap();
        dispatcher.flush(session.id).await;
        assert_eq!(limiter.available_permits(), 1);
        assert_eq!(session.sent(), vec![Sent::Text("a".into())]);
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Handshaking.to_string(), "HANDSHAKING");
        assert_eq!(SessionState::Closed.to_string(), "CLOSED");
    }
}
