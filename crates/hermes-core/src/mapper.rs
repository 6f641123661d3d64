//! Exception mappers.
//!
//! A mapper turns one error type into a response. Lookup walks the error's
//! cause chain from the outermost error inwards and, for each cause, asks the
//! mappers in registration order; the first mapper that claims a cause
//! produces the response.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::types::Response;

/// Converts an error into a response.
pub trait ExceptionMapper: Send + Sync + 'static {
    /// Name of the error type this mapper handles, for logs.
    fn error_type(&self) -> &'static str;

    /// Returns a response if `error` is of the handled type.
    fn try_map(&self, error: &(dyn StdError + 'static)) -> Option<Response>;
}

/// An [`ExceptionMapper`] for the concrete error type `E`.
pub struct TypedMapper<E, F> {
    map: F,
    _error: PhantomData<fn(&E)>,
}

impl<E, F> TypedMapper<E, F>
where
    E: StdError + 'static,
    F: Fn(&E) -> Response + Send + Sync + 'static,
{
    /// Wraps a mapping function.
    pub fn new(map: F) -> Self {
        Self {
            map,
            _error: PhantomData,
        }
    }
}

impl<E, F> ExceptionMapper for TypedMapper<E, F>
where
    E: StdError + 'static,
    F: Fn(&E) -> Response + Send + Sync + 'static,
{
    fn error_type(&self) -> &'static str {
        type_name::<E>()
    }

    fn try_map(&self, error: &(dyn StdError + 'static)) -> Option<Response> {
        error.downcast_ref::<E>().map(&self.map)
    }
}

/// The exception-mapper table of one registry.
///
/// # Example
///
/// ```
/// use hermes_core::{ExceptionMappers, Response, ResponseExt};
/// use http::StatusCode;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("user {0} not found")]
/// struct UserNotFound(u64);
///
/// let mut mappers = ExceptionMappers::new();
/// mappers.register(|e: &UserNotFound| Response::text(StatusCode::NOT_FOUND, e.to_string()));
///
/// let err = anyhow::Error::new(UserNotFound(7)).context("loading profile");
/// let response = mappers.map(&err).unwrap();
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// ```
#[derive(Clone, Default)]
pub struct ExceptionMappers {
    mappers: Vec<Arc<dyn ExceptionMapper>>,
}

impl ExceptionMappers {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping function for errors of type `E`.
    pub fn register<E, F>(&mut self, map: F)
    where
        E: StdError + 'static,
        F: Fn(&E) -> Response + Send + Sync + 'static,
    {
        self.register_mapper(Arc::new(TypedMapper::new(map)));
    }

    /// Registers a prebuilt mapper.
    pub fn register_mapper(&mut self, mapper: Arc<dyn ExceptionMapper>) {
        tracing::debug!(error_type = mapper.error_type(), "Exception mapper registered");
        self.mappers.push(mapper);
    }

    /// Finds a response for `error`, if any mapper claims it.
    pub fn map(&self, error: &anyhow::Error) -> Option<Response> {
        error
            .chain()
            .find_map(|cause| self.mappers.iter().find_map(|m| m.try_map(cause)))
    }

    /// Number of registered mappers.
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    /// Returns true if no mapper is registered.
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl fmt::Debug for ExceptionMappers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.mappers.iter().map(|m| m.error_type()))
            .finish()
    }
}
