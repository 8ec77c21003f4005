use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error codes carried in `ERROR` envelopes.
///
/// The set is closed apart from [`ErrorCode::Custom`], which carries codes
/// raised by command handlers that the bridge forwards without
/// interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// The message was not valid JSON or lacked a required envelope field.
    InvalidPayload,
    /// The requested command is not registered.
    InvalidCommand,
    /// A subscription command named an event the bridge does not know.
    InvalidEvent,
    /// Handler-raised: arguments were well-formed but semantically invalid.
    InvalidArgs,
    /// Handler-raised: the referenced entity does not exist.
    NotFound,
    /// An unclassified failure.
    UnknownError,
    /// Handler-defined code forwarded verbatim.
    Custom(String),
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::InvalidEvent => "INVALID_EVENT",
            Self::InvalidArgs => "INVALID_ARGS",
            Self::NotFound => "NOT_FOUND",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::Custom(code) => code.as_str(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrorCode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INVALID_PAYLOAD" => Self::InvalidPayload,
            "INVALID_COMMAND" => Self::InvalidCommand,
            "INVALID_EVENT" => Self::InvalidEvent,
            "INVALID_ARGS" => Self::InvalidArgs,
            "NOT_FOUND" => Self::NotFound,
            "UNKNOWN_ERROR" => Self::UnknownError,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Custom(value) => value,
            other => other.as_str().to_owned(),
        }
    }
}
