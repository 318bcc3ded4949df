//! Error types for the relay
//!
//! Provides unified error handling using thiserror.
//!
//! The shaping layer never invents failures of its own for a producer: a
//! producer's error travels back to its caller inside [`CallError::Producer`].
//! The remaining [`CallError`] variants describe calls that never produced an
//! outcome because they were interrupted.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Call Error ==
/// Outcome of a shaped call that did not yield a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError<E> {
    /// A newer debounced call under the same key replaced this one
    #[error("call under key '{0}' was superseded by a newer call")]
    Superseded(String),

    /// The debounced call was cancelled before it fired
    #[error("call under key '{0}' was cancelled")]
    Cancelled(String),

    /// The batch holding this request was cleared, or its producer panicked
    #[error("request '{0}' was dropped before its batch settled")]
    Dropped(String),

    /// The producer itself failed
    #[error("{0}")]
    Producer(E),
}

impl<E> CallError<E> {
    /// Returns the producer's error, if this is one.
    pub fn into_producer(self) -> Option<E> {
        match self {
            CallError::Producer(err) => Some(err),
            _ => None,
        }
    }
}

impl<E> CallError<CallError<E>> {
    /// Collapses a shaped call nested inside another shaped call.
    pub fn flatten(self) -> CallError<E> {
        match self {
            CallError::Superseded(key) => CallError::Superseded(key),
            CallError::Cancelled(key) => CallError::Cancelled(key),
            CallError::Dropped(id) => CallError::Dropped(id),
            CallError::Producer(inner) => inner,
        }
    }
}

// == Connector Error ==
/// Failures of an upstream connector call.
///
/// Cloneable so that one outcome can be handed to every caller that shared
/// the underlying request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("network failure: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Upstream body was not valid JSON
    #[error("invalid upstream response: {0}")]
    Decode(String),
}

// == API Error Enum ==
/// HTTP-facing error type for the relay.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Named resource (store, key) not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Call was interrupted before producing a result
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConnectorError> for ApiError {
    fn from(err: ConnectorError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<CallError<ConnectorError>> for ApiError {
    fn from(err: CallError<ConnectorError>) -> Self {
        match err {
            CallError::Producer(inner) => inner.into(),
            other => ApiError::Interrupted(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Interrupted(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
