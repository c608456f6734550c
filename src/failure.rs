//! Failure values raised by request handlers.
//!
//! Handlers return `Result<T, Failure>`. [`Failure`] wraps an
//! [`anyhow::Error`], so any error type converts into it with `?`. A small set
//! of declared kinds is recognized by [`crate::taxonomy::classify`]:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PermissionDenied`] | caller may not perform the operation |
//! | [`InvalidArgument`] | an input violated a precondition |
//! | [`NotFound`] | a looked-up key does not exist |
//! | [`WriteConflict`] | the data store rejected a write |
//!
//! Every other error type is unrecognized and maps to a generic 500.
//!
//! # Reaching the Recovery Boundary
//!
//! Axum handlers cannot throw, so `Failure` implements [`IntoResponse`] by
//! producing a bodiless 500 that carries the failure in its extensions as a
//! [`RaisedFailure`]. [`crate::middleware::ErrorTranslationLayer`] removes it
//! and writes the client-facing envelope. Without that layer in the stack the
//! bare 500 is what the client sees.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// The caller is not allowed to access the resource.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PermissionDenied(pub String);

/// An argument failed validation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvalidArgument {
    /// Name of the offending parameter, when known.
    pub param: Option<String>,
    pub message: String,
}

impl InvalidArgument {
    pub fn new(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: Some(param.into()),
            message: message.into(),
        }
    }
}

/// A lookup found no entry for the requested key.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct NotFound(pub String);

/// The data store refused to apply a write.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct WriteConflict {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WriteConflict {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Any failure a handler can raise.
pub struct Failure(anyhow::Error);

impl Failure {
    /// Wrap a panic payload caught at the recovery boundary.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self(anyhow::anyhow!("handler panicked: {message}"))
    }

    /// Borrow the wrapped error, e.g. to downcast it.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Full diagnostic rendering: message, cause chain and backtrace if captured.
    pub fn detail(&self) -> String {
        format!("{:?}", self.0)
    }
}

impl<E> From<E> for Failure
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A handler failure travelling from the handler to the recovery boundary.
///
/// Response extensions must be `Clone`, hence the `Arc`.
#[derive(Clone)]
pub struct RaisedFailure(pub Arc<Failure>);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response
            .extensions_mut()
            .insert(RaisedFailure(Arc::new(self)));
        response
    }
}

/// Convenience type alias for handler results.
pub type HandlerResult<T> = Result<T, Failure>;
