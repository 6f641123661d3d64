//! Top-level error type.

use thiserror::Error;

use hermes_config::ConfigError;
use hermes_core::RegistrationError;
use hermes_telemetry::TelemetryError;

use crate::channel::ChannelId;

/// Result type alias for runtime operations.
pub type HermesResult<T> = Result<T, HermesError>;

/// Failures raised while building or driving the runtime.
#[derive(Debug, Error)]
pub enum HermesError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// A resource or endpoint was rejected.
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// No registry exists for the channel.
    #[error("unknown channel {channel}")]
    ChannelNotFound {
        /// The channel.
        channel: ChannelId,
    },

    /// The processor was shut down.
    #[error("message processor is closed")]
    ProcessorClosed,
}

impl HermesError {
    /// Create a channel-not-found error.
    pub fn channel_not_found(channel: ChannelId) -> Self {
        Self::ChannelNotFound { channel }
    }
}
