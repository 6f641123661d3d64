//! Inbound message processing.
//!
//! The transport hands every message to [`MessageProcessor::submit`]. HTTP
//! requests are dispatched on their own task, bounded by the processor's
//! semaphore, and answered exactly once through their [`Responder`].
//! WebSocket frames are queued on their session in submission order; the
//! session's worker runs the callbacks under the same semaphore.

use std::sync::Arc;

use http::StatusCode;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error};

use hermes_core::{DispatchError, Response, ResponseExt};
use hermes_http::InboundRequest;
use hermes_telemetry::InFlightGuard;
use hermes_ws::Frame;

use crate::channel::{ChannelId, ChannelRegistries};
use crate::error::{HermesError, HermesResult};

/// Delivers the single response of one HTTP request.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Response>,
}

impl Responder {
    /// Creates a responder and the receiver the transport waits on.
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Sends the response. Returns false if the transport stopped waiting.
    pub fn send(self, response: Response) -> bool {
        self.tx.send(response).is_ok()
    }
}

/// A message as classified by the transport.
#[derive(Debug)]
pub enum InboundMessage {
    /// An HTTP request.
    Http {
        /// The channel it arrived on.
        channel: ChannelId,
        /// The request.
        request: InboundRequest,
        /// Where the response goes.
        responder: Responder,
    },
    /// A WebSocket frame.
    WebSocket {
        /// The channel it arrived on.
        channel: ChannelId,
        /// The frame.
        frame: Frame,
    },
}

impl InboundMessage {
    /// The channel the message arrived on.
    pub fn channel(&self) -> &ChannelId {
        match self {
            Self::Http { channel, .. } | Self::WebSocket { channel, .. } => channel,
        }
    }

    /// `http` or `websocket`.
    pub fn protocol(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::WebSocket { .. } => "websocket",
        }
    }
}

/// The bounded worker pool in front of the dispatchers.
#[derive(Debug, Clone)]
pub struct MessageProcessor {
    channels: Arc<ChannelRegistries>,
    limiter: Arc<Semaphore>,
}

impl MessageProcessor {
    /// Creates a processor allowing `limiter`'s permits of concurrent work.
    ///
    /// Pass the same semaphore to [`ChannelRegistries::with_limiter`] so
    /// WebSocket callbacks count against the same bound.
    pub fn new(channels: Arc<ChannelRegistries>, limiter: Arc<Semaphore>) -> Self {
        Self { channels, limiter }
    }

    /// The channel table.
    pub fn channels(&self) -> &Arc<ChannelRegistries> {
        &self.channels
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Stops accepting HTTP work. Requests already running finish.
    pub fn close(&self) {
        self.limiter.close();
    }

    /// Accepts one message.
    ///
    /// For HTTP this waits for a permit, then spawns the dispatch and
    /// returns. A request on an unknown channel is answered `404`. For
    /// WebSocket this returns once the frame is queued on its session;
    /// frames on unknown channels, unknown sessions or refused handshakes
    /// are dropped and logged.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn submit(&self, message: InboundMessage) -> HermesResult<()> {
        match message {
            InboundMessage::Http {
                channel,
                request,
                responder,
            } => self.submit_http(channel, request, responder).await,
            InboundMessage::WebSocket { channel, frame } => {
                self.submit_frame(&channel, frame).await;
                Ok(())
            }
        }
    }

    async fn submit_http(
        &self,
        channel: ChannelId,
        request: InboundRequest,
        responder: Responder,
    ) -> HermesResult<()> {
        let Some(registry) = self.channels.get(&channel) else {
            debug!(channel = %channel, path = %request.path(), "Request for unknown channel");
            let response = DispatchError::not_found(request.path()).into_response();
            drop(request);
            responder.send(response);
            return Ok(());
        };

        let Ok(permit) = Arc::clone(&self.limiter).acquire_owned().await else {
            drop(request);
            responder.send(Response::empty(StatusCode::SERVICE_UNAVAILABLE));
            return Err(HermesError::ProcessorClosed);
        };

        tokio::spawn(async move {
            let _permit = permit;
            let _in_flight = InFlightGuard::new();
            let response = registry.http().dispatch(request).await;
            if !responder.send(response) {
                debug!(channel = %channel, "Transport stopped waiting for the response");
            }
        });
        Ok(())
    }

    async fn submit_frame(&self, channel: &ChannelId, frame: Frame) {
        let Some(registry) = self.channels.get(channel) else {
            error!(channel = %channel, kind = frame.kind.label(), "Frame for unknown channel dropped");
            return;
        };

        let session = frame.session.id();
        if let Err(err) = registry.ws().dispatch(frame).await {
            debug!(channel = %channel, session_id = %session, error = %err, "Frame not dispatched");
        }
    }
}
