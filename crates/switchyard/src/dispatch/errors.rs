//! Error types for command dispatch failures.
//!
//! Each variant is one failure point of the pipeline. [`DispatchError::code`]
//! maps it onto the wire taxonomy and [`DispatchError::into_handled`] produces
//! the host-facing `{ code, message }` pair exactly once, at emission.

use std::any::Any;

use switchyard_protocol::ErrorCode;
use thiserror::Error;
use tokio::task::JoinError;

use super::schema::SchemaError;
use crate::error::HandledError;

/// Message sent to the host for unparseable input.
pub(crate) const EXPECTED_JSON: &str = "Invalid payload, expected json";

/// Message sent to the host when the nonce is missing.
pub(crate) const REQUIRES_NONCE: &str = "Payload requires a nonce";

/// Errors surfaced while dispatching a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message exceeds the configured size limit.
    #[error("message of {size} bytes exceeds the {max_size} byte limit")]
    PayloadTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// The message is not a JSON object.
    #[error("malformed JSON: {message}")]
    MalformedJson {
        /// Parser explanation.
        message: String,
        /// Underlying parser error, absent for non-object documents.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The `nonce` field is missing, empty or not a string.
    #[error("payload requires a nonce")]
    MissingNonce,

    /// The `args` field is present but not an object.
    #[error("payload args must be an object")]
    ArgsNotObject,

    /// The `evt` field is present but not a string.
    #[error("payload evt must be a string")]
    EventNotString,

    /// The `cmd` field is missing or not a string.
    #[error("payload is missing cmd")]
    MissingCommand,

    /// No handler is registered under the requested name.
    #[error("unknown command: {name}")]
    UnknownCommand {
        /// The unresolved command name.
        name: String,
    },

    /// The arguments failed the command's validation schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] SchemaError),

    /// The handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(#[from] HandledError),

    /// The handler panicked.
    #[error("handler panicked: {message}")]
    HandlerPanicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The handler task was cancelled before completing.
    #[error("handler task was cancelled")]
    HandlerCancelled,
}

impl DispatchError {
    /// Creates a malformed JSON error from a parser error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed JSON error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJson {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates a payload size error.
    pub const fn payload_too_large(size: usize, max_size: usize) -> Self {
        Self::PayloadTooLarge { size, max_size }
    }

    /// Classifies a failed handler task.
    pub fn from_join_error(error: JoinError) -> Self {
        if error.is_panic() {
            Self::HandlerPanicked {
                message: panic_message(error.into_panic().as_ref()),
            }
        } else {
            Self::HandlerCancelled
        }
    }

    /// Returns the wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PayloadTooLarge { .. }
            | Self::MalformedJson { .. }
            | Self::MissingNonce
            | Self::ArgsNotObject
            | Self::EventNotString
            | Self::InvalidArguments(_) => ErrorCode::InvalidPayload,
            Self::MissingCommand | Self::UnknownCommand { .. } => ErrorCode::InvalidCommand,
            Self::Handler(error) => error.code().clone(),
            Self::HandlerPanicked { .. } | Self::HandlerCancelled => ErrorCode::UnknownError,
        }
    }

    /// Converts the failure into the host-facing error.
    pub fn into_handled(self) -> HandledError {
        let code = self.code();
        let message = match self {
            Self::PayloadTooLarge { max_size, .. } => {
                format!("Payload exceeds {max_size} byte limit")
            }
            Self::MalformedJson { .. } => EXPECTED_JSON.to_owned(),
            Self::MissingNonce => REQUIRES_NONCE.to_owned(),
            Self::ArgsNotObject => "Payload args must be an object".to_owned(),
            Self::EventNotString => "Payload evt must be a string".to_owned(),
            Self::MissingCommand => "missing cmd".to_owned(),
            Self::UnknownCommand { name } => name,
            Self::InvalidArguments(error) => error.to_string(),
            Self::Handler(error) => return error,
            Self::HandlerPanicked { message } => message,
            Self::HandlerCancelled => "Unknown error".to_owned(),
        };
        HandledError::new(code, message)
    }
}

/// Renders a panic payload, falling back to a generic message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "Unknown error".to_owned()
}
