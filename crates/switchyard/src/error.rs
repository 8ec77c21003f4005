//! The error value every pipeline failure is normalised into.
//!
//! Handlers raise [`HandledError`] to report a failure with a specific code;
//! the dispatch pipeline converts its own failures into the same shape before
//! emitting them, so the host only ever sees `{ code, message }`.

use switchyard_protocol::{ErrorCode, ErrorPayload};
use thiserror::Error;

/// A failure with a machine-readable code and a host-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct HandledError {
    code: ErrorCode,
    message: String,
}

impl HandledError {
    /// Creates an error with an explicit code.
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an `INVALID_PAYLOAD` error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPayload, message)
    }

    /// Creates an `INVALID_COMMAND` error naming the unresolved command.
    pub fn invalid_command(name: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCommand, name)
    }

    /// Creates an `INVALID_EVENT` error for an unregistered event name.
    pub fn invalid_event(event: &str) -> Self {
        Self::new(ErrorCode::InvalidEvent, format!("Unknown event: {event}"))
    }

    /// Creates an `INVALID_ARGS` error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgs, message)
    }

    /// Creates a `NOT_FOUND` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Creates an `UNKNOWN_ERROR` error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, message)
    }

    /// The error code.
    #[must_use]
    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    /// The host-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Converts the error into its wire payload.
    #[must_use]
    pub fn into_payload(self) -> ErrorPayload {
        ErrorPayload::new(self.code, self.message)
    }
}
