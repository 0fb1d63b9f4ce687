//! HTTP boundary helpers

pub mod boundary;

pub use boundary::{ErrorResponse, IntoErrorResponse};
