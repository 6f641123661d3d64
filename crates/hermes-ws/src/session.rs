//! The session capability.
//!
//! Sessions belong to the transport. The dispatcher only needs a stable
//! identity to route frames and a way to send frames back.

use std::fmt;

use bytes::Bytes;
use uuid::Uuid;

use hermes_core::BoxFuture;

/// A unique identifier for a WebSocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new time-ordered session ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// An open connection as seen by the dispatcher.
///
/// Implemented by the transport. Send failures are reported to the
/// endpoint's `onError` callback like any other callback failure.
pub trait Session: Send + Sync + 'static {
    /// Stable identity used to route frames to the same endpoint.
    fn id(&self) -> SessionId;

    /// Sends a text frame.
    fn send_text(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Sends a binary frame.
    fn send_binary(&self, data: Bytes) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Sends a pong frame.
    fn send_pong(&self, data: Bytes) -> BoxFuture<'_, anyhow::Result<()>>;
}

impl fmt::Debug for dyn Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id()).finish()
    }
}
