//! Typed configuration for Hermes.
//!
//! [`HermesConfig`] is loaded in layers by [`ConfigLoader`]: defaults, then
//! a TOML or JSON file, then `HERMES__SECTION__KEY` environment variables.
//! Unknown fields are rejected.
//!
//! # Configuration File Format
//!
//! ```toml
//! [dispatcher]
//! max_in_flight = 64
//! default_media_type = "*/*"
//! session_queue_capacity = 256
//!
//! [websocket]
//! disconnect_on_remove = false
//!
//! [logging]
//! level = "info"
//! format = "json"
//! include_location = false
//! service_name = "hermes"
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{DispatcherSection, LogFormat, LoggingSection, WebsocketSection};
