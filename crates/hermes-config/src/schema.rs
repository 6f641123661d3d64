//! Configuration schema types.

use serde::{Deserialize, Serialize};

use hermes_telemetry::LogConfig;

/// Dispatcher settings shared by the HTTP and WebSocket paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatcherSection {
    /// Maximum number of inbound messages processed concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Media type chosen when neither the client nor the resource states one.
    #[serde(default = "default_media_type")]
    pub default_media_type: String,

    /// Depth of each WebSocket session's frame queue.
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            default_media_type: default_media_type(),
            session_queue_capacity: default_session_queue_capacity(),
        }
    }
}

fn default_max_in_flight() -> usize {
    64
}

fn default_media_type() -> String {
    "*/*".to_string()
}

fn default_session_queue_capacity() -> usize {
    256
}

/// WebSocket settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WebsocketSection {
    /// Forget a channel's open sessions when the channel is removed,
    /// instead of letting them run until they close.
    #[serde(default)]
    pub disconnect_on_remove: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs.
    #[default]
    Json,
    /// Human-readable pretty format.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line.
    #[serde(default)]
    pub include_location: bool,

    /// Service name attached to log output.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            service_name: default_service_name(),
        }
    }
}

impl LoggingSection {
    /// Converts this section into a telemetry [`LogConfig`].
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        let base = match self.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            file_line_info: self.include_location,
            ..base
        }
        .with_level(self.level.clone())
        .with_service_name(self.service_name.clone())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "hermes".to_string()
}
