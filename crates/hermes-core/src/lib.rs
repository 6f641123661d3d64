//! Core types for the Hermes dispatch runtime.
//!
//! This crate holds what both dispatchers share:
//!
//! - [`DispatchError`] and [`RegistrationError`], the failure taxonomy
//! - [`HandlerException`], a failure that carries its own response
//! - [`media`], content negotiation over `produces` / `consumes` / `Accept`
//! - [`ExceptionMappers`], the per-registry error-to-response table
//! - [`Response`] and [`ResponseExt`], the response type every path produces

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod mapper;
pub mod media;
pub mod types;

pub use error::{
    DispatchError, DispatchResult, HandlerException, RegistrationError, RegistrationResult,
};
pub use mapper::{ExceptionMapper, ExceptionMappers, TypedMapper};
pub use media::{negotiate, parse_accept, validate_consumes, MediaType};
pub use types::{BoxFuture, Response, ResponseExt, TEXT_PLAIN_UTF8};
