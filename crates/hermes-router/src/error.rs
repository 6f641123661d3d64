//! Router error types.

use thiserror::Error;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while registering templates or expanding them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A template with the same literal/variable shape is already registered.
    #[error("duplicate route: {template} has the same shape as {existing}")]
    DuplicateRoute {
        /// The template being registered.
        template: String,
        /// The template already present.
        existing: String,
    },

    /// The template text could not be parsed.
    #[error("invalid route template {template}: {reason}")]
    InvalidTemplate {
        /// The offending template text.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Expansion needed a variable that was not supplied.
    #[error("missing value for path variable {name}")]
    MissingVariable {
        /// Name of the variable.
        name: String,
    },
}

impl RouterError {
    /// Create a duplicate route error.
    pub fn duplicate(template: impl Into<String>, existing: impl Into<String>) -> Self {
        Self::DuplicateRoute {
            template: template.into(),
            existing: existing.into(),
        }
    }

    /// Create an invalid template error.
    pub fn invalid_template(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing variable error.
    pub fn missing_variable(name: impl Into<String>) -> Self {
        Self::MissingVariable { name: name.into() }
    }
}
