//! Inbound frames, as classified by the transport.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, CONNECTION, UPGRADE};

use crate::error::{CloseCode, WsError, WsResult};
use crate::session::Session;

/// The status code and text of a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    code: u16,
    reason: String,
}

impl CloseReason {
    /// Create a close reason from a raw code.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// A normal closure with no text.
    pub fn normal() -> Self {
        Self::from_code(CloseCode::Normal, "")
    }

    /// Create a close reason from a registered code.
    pub fn from_code(code: CloseCode, reason: impl Into<String>) -> Self {
        Self::new(code.as_u16(), reason)
    }

    /// The raw close code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The registered close code, if the raw code is one.
    pub fn close_code(&self) -> Option<CloseCode> {
        CloseCode::from_u16(self.code)
    }

    /// The human-readable text.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// What a frame carries.
#[derive(Debug, Clone)]
pub enum FrameKind {
    /// The connection-upgrade status frame.
    Open {
        /// The request path the client connected to.
        uri: String,
        /// The upgrade request headers.
        headers: HeaderMap,
    },
    /// A text frame.
    Text(String),
    /// A binary frame or fragment.
    Binary {
        /// The payload.
        data: Bytes,
        /// False while more fragments follow.
        final_fragment: bool,
    },
    /// A pong control frame.
    Pong(Bytes),
    /// The close status frame.
    Close(CloseReason),
}

impl FrameKind {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Text(_) => "text",
            Self::Binary { .. } => "binary",
            Self::Pong(_) => "pong",
            Self::Close(_) => "close",
        }
    }
}

/// One inbound frame on a session.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The session the frame arrived on.
    pub session: Arc<dyn Session>,
    /// The frame contents.
    pub kind: FrameKind,
}

impl Frame {
    /// An upgrade frame for `uri`.
    pub fn open(session: Arc<dyn Session>, uri: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            session,
            kind: FrameKind::Open {
                uri: uri.into(),
                headers,
            },
        }
    }

    /// A text frame.
    pub fn text(session: Arc<dyn Session>, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: FrameKind::Text(text.into()),
        }
    }

    /// A binary frame.
    pub fn binary(session: Arc<dyn Session>, data: impl Into<Bytes>, final_fragment: bool) -> Self {
        Self {
            session,
            kind: FrameKind::Binary {
                data: data.into(),
                final_fragment,
            },
        }
    }

    /// A pong frame.
    pub fn pong(session: Arc<dyn Session>, data: impl Into<Bytes>) -> Self {
        Self {
            session,
            kind: FrameKind::Pong(data.into()),
        }
    }

    /// A close frame.
    pub fn close(session: Arc<dyn Session>, reason: CloseReason) -> Self {
        Self {
            session,
            kind: FrameKind::Close(reason),
        }
    }
}

/// Checks the upgrade headers of an open frame.
///
/// `Connection` must list the `upgrade` token and `Upgrade` must be
/// `websocket`, both compared case-insensitively.
pub fn check_upgrade(headers: &HeaderMap) -> WsResult<()> {
    let connection_upgrade = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    if !connection_upgrade {
        return Err(WsError::not_websocket("Connection header does not request an upgrade"));
    }

    let upgrade_websocket = headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));
    if !upgrade_websocket {
        return Err(WsError::not_websocket("Upgrade header is not websocket"));
    }

    Ok(())
}
