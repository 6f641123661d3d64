//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required file does not exist.
    #[error("no configuration file at {path}")]
    MissingFile {
        /// The path looked up.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {path}")]
    Unreadable {
        /// The file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format `{format}`")]
    UnsupportedFormat {
        /// The format name or file extension given.
        format: String,
    },

    /// A TOML document did not match the schema.
    #[error("bad TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON document did not match the schema.
    #[error("bad JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A `HERMES__*` override could not be applied.
    #[error("bad override {var}: {reason}")]
    Override {
        /// The environment variable.
        var: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A loaded value is out of range or malformed.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field.
        field: String,
        /// Why the value is rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Create a missing-file error.
    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    /// Create an unreadable-file error.
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// Create an unsupported-format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a bad-override error.
    pub fn bad_override(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Override {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
