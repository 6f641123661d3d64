//! WebSocket error types.

use std::fmt;

use thiserror::Error;

use crate::endpoint::{CallbackKind, ReturnKind};
use crate::session::SessionId;

/// Result type alias for WebSocket dispatch.
pub type WsResult<T> = Result<T, WsError>;

/// Failures raised while dispatching WebSocket frames.
///
/// Callback failures are not returned to the transport. They are routed to
/// the endpoint's `onError` callback, or logged when it has none.
#[derive(Debug, Error)]
pub enum WsError {
    /// The open frame is not a WebSocket upgrade.
    #[error("not a WebSocket upgrade: {reason}")]
    NotWebSocketRequest {
        /// Which header is missing or wrong.
        reason: String,
    },

    /// No endpoint template matches the handshake URI.
    #[error("no WebSocket endpoint for {uri}")]
    EndpointNotFound {
        /// The handshake URI.
        uri: String,
    },

    /// The session was opened twice.
    #[error("session {session} is already open")]
    SessionExists {
        /// The session.
        session: SessionId,
    },

    /// The frame belongs to a session that was never opened.
    #[error("unknown session {session}")]
    SessionNotFound {
        /// The session.
        session: SessionId,
    },

    /// The frame arrived after the session started closing.
    #[error("session {session} is closing")]
    SessionClosed {
        /// The session.
        session: SessionId,
    },

    /// A binding instruction found no value in the frame.
    #[error("cannot bind parameter: {reason}")]
    Binding {
        /// What could not be bound.
        reason: String,
    },

    /// A callback returned a reply its declared return kind does not allow.
    #[error("{callback} declared {declared} but returned {returned}")]
    UnexpectedReply {
        /// The callback.
        callback: CallbackKind,
        /// The declared return kind.
        declared: ReturnKind,
        /// The kind of reply actually returned.
        returned: &'static str,
    },
}

impl WsError {
    /// Create a not-a-websocket error.
    pub fn not_websocket(reason: impl Into<String>) -> Self {
        Self::NotWebSocketRequest {
            reason: reason.into(),
        }
    }

    /// Create an endpoint-not-found error.
    pub fn endpoint_not_found(uri: impl Into<String>) -> Self {
        Self::EndpointNotFound { uri: uri.into() }
    }

    /// Create a session-exists error.
    pub fn session_exists(session: SessionId) -> Self {
        Self::SessionExists { session }
    }

    /// Create a session-not-found error.
    pub fn session_not_found(session: SessionId) -> Self {
        Self::SessionNotFound { session }
    }

    /// Create a session-closed error.
    pub fn session_closed(session: SessionId) -> Self {
        Self::SessionClosed { session }
    }

    /// Create a binding error.
    pub fn binding(reason: impl Into<String>) -> Self {
        Self::Binding {
            reason: reason.into(),
        }
    }

    /// Create an unexpected-reply error.
    pub fn unexpected_reply(
        callback: CallbackKind,
        declared: ReturnKind,
        returned: &'static str,
    ) -> Self {
        Self::UnexpectedReply {
            callback,
            declared,
            returned,
        }
    }

    /// Returns true if the handshake was refused and no session exists.
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::NotWebSocketRequest { .. } | Self::EndpointNotFound { .. }
        )
    }
}

/// WebSocket close codes as defined in RFC 6455.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure.
    Normal = 1000,
    /// Endpoint is going away.
    GoingAway = 1001,
    /// Protocol error.
    Protocol = 1002,
    /// Unsupported data type.
    Unsupported = 1003,
    /// No status code was present.
    NoStatus = 1005,
    /// Connection closed abnormally.
    Abnormal = 1006,
    /// Invalid payload data.
    InvalidPayload = 1007,
    /// Policy violation.
    PolicyViolation = 1008,
    /// Message too big.
    MessageTooBig = 1009,
    /// Missing extension.
    ExtensionRequired = 1010,
    /// Internal server error.
    InternalError = 1011,
    /// Service restart.
    ServiceRestart = 1012,
    /// Try again later.
    TryAgainLater = 1013,
    /// Bad gateway.
    BadGateway = 1014,
    /// TLS handshake failure.
    TlsHandshake = 1015,
}

impl CloseCode {
    /// Looks up a registered close code.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::Protocol),
            1003 => Some(Self::Unsupported),
            1005 => Some(Self::NoStatus),
            1006 => Some(Self::Abnormal),
            1007 => Some(Self::InvalidPayload),
            1008 => Some(Self::PolicyViolation),
            1009 => Some(Self::MessageTooBig),
            1010 => Some(Self::ExtensionRequired),
            1011 => Some(Self::InternalError),
            1012 => Some(Self::ServiceRestart),
            1013 => Some(Self::TryAgainLater),
            1014 => Some(Self::BadGateway),
            1015 => Some(Self::TlsHandshake),
            _ => None,
        }
    }

    /// The numeric code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns true for codes an endpoint may send in a close frame.
    ///
    /// `1005`, `1006` and `1015` only describe a closure locally.
    pub fn is_sendable(self) -> bool {
        !matches!(self, Self::NoStatus | Self::Abnormal | Self::TlsHandshake)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::GoingAway => "GoingAway",
            Self::Protocol => "Protocol",
            Self::Unsupported => "Unsupported",
            Self::NoStatus => "NoStatus",
            Self::Abnormal => "Abnormal",
            Self::InvalidPayload => "InvalidPayload",
            Self::PolicyViolation => "PolicyViolation",
            Self::MessageTooBig => "MessageTooBig",
            Self::ExtensionRequired => "ExtensionRequired",
            Self::InternalError => "InternalError",
            Self::ServiceRestart => "ServiceRestart",
            Self::TryAgainLater => "TryAgainLater",
            Self::BadGateway => "BadGateway",
            Self::TlsHandshake => "TlsHandshake",
        };
        write!(f, "{} ({})", name, self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_failures() {
        assert!(WsError::not_websocket("missing Upgrade header").is_handshake_failure());
        assert!(WsError::endpoint_not_found("/nope").is_handshake_failure());
        assert!(!WsError::session_not_found(SessionId::new()).is_handshake_failure());
    }

    #[test]
    fn test_unexpected_reply_display() {
        let err = WsError::unexpected_reply(CallbackKind::Text, ReturnKind::Void, "text");
        assert_eq!(err.to_string(), "onText declared void but returned text");
    }

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), Some(CloseCode::Normal));
        assert_eq!(CloseCode::from_u16(1011), Some(CloseCode::InternalError));
        assert_eq!(CloseCode::from_u16(1004), None);
        assert_eq!(CloseCode::from_u16(4000), None);
    }

    #[test]
    fn test_close_code_sendable() {
        assert!(CloseCode::GoingAway.is_sendable());
        assert!(!CloseCode::Abnormal.is_sendable());
    }

    #[test]
    fn test_close_code_display() {
        assert_eq!(CloseCode::Normal.to_string(), "Normal (1000)");
        assert_eq!(CloseCode::PolicyViolation.to_string(), "PolicyViolation (1008)");
    }
}
