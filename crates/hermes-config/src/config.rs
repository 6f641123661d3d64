//! The root configuration type.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DispatcherSection, LogFormat, LoggingSection, WebsocketSection};

/// Complete Hermes configuration.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.dispatcher.max_in_flight, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Dispatcher settings.
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    /// WebSocket settings.
    #[serde(default)]
    pub websocket: WebsocketSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl HermesConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `dispatcher.max_in_flight` or `dispatcher.session_queue_capacity` is zero
    /// - `dispatcher.default_media_type` is not a media range
    /// - `logging.level` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatcher.max_in_flight == 0 {
            return Err(ConfigError::invalid_value(
                "dispatcher.max_in_flight",
                "must be greater than zero",
            ));
        }

        if self.dispatcher.session_queue_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "dispatcher.session_queue_capacity",
                "must be greater than zero",
            ));
        }

        if let Err(e) = self.dispatcher.default_media_type.parse::<mime::Mime>() {
            return Err(ConfigError::invalid_value(
                "dispatcher.default_media_type",
                format!("{}: {e}", self.dispatcher.default_media_type),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs with source locations.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config
    }

    /// Production preset: JSON logs at info level.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}
