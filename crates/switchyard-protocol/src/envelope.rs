use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{DISPATCH, ERROR_EVENT, ErrorCode, PROTOCOL_VERSION, READY_EVENT};

/// The single outbound wire shape.
///
/// Field order matches the serialised order: `cmd`, `data`, `evt`, `nonce`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Command name the envelope answers, or [`DISPATCH`] for notifications.
    pub cmd: String,
    /// Handler result, event payload or [`ErrorPayload`].
    pub data: Value,
    /// `None` for command responses, otherwise the event name.
    pub evt: Option<String>,
    /// Nonce of the originating command, `None` for background traffic.
    pub nonce: Option<String>,
}

/// Payload of an `ERROR` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable explanation.
    pub message: String,
}

impl Envelope {
    /// Builds a successful command response.
    #[must_use]
    pub fn response(cmd: impl Into<String>, nonce: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: cmd.into(),
            data,
            evt: None,
            nonce: Some(nonce.into()),
        }
    }

    /// Builds a subscription event notification.
    #[must_use]
    pub fn event(evt: impl Into<String>, data: Value) -> Self {
        Self {
            cmd: DISPATCH.to_owned(),
            data,
            evt: Some(evt.into()),
            nonce: None,
        }
    }

    /// Builds an error notification.
    ///
    /// `cmd` falls back to [`DISPATCH`] when the failing message never named
    /// a command.
    #[must_use]
    pub fn error(cmd: Option<&str>, nonce: Option<&str>, error: ErrorPayload) -> Self {
        let data = serde_json::to_value(&error).unwrap_or_else(|_| {
            json!({ "code": error.code.as_str(), "message": error.message })
        });
        Self {
            cmd: cmd.unwrap_or(DISPATCH).to_owned(),
            data,
            evt: Some(ERROR_EVENT.to_owned()),
            nonce: nonce.map(str::to_owned),
        }
    }

    /// Builds the startup handshake advertising the active configuration.
    #[must_use]
    pub fn ready(config: Value) -> Self {
        Self::event(
            READY_EVENT,
            json!({ "v": PROTOCOL_VERSION, "config": config }),
        )
    }

    /// Returns `true` when this envelope reports an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.evt.as_deref() == Some(ERROR_EVENT)
    }

    /// Decodes the error payload of an `ERROR` envelope.
    #[must_use]
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if !self.is_error() {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

impl ErrorPayload {
    /// Builds a payload from a code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
