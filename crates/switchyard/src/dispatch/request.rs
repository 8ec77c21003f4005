//! Parsing of inbound command lines.
//!
//! Parsing is staged so that a rejection still carries whatever correlation
//! data was recovered before the failing step: a line that fails JSON
//! parsing has neither `cmd` nor nonce, while a line with a bad `args` field
//! already knows both.

use serde_json::{Map, Value};

use super::errors::DispatchError;

/// A command line that passed structural validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Correlation token echoed in the response.
    pub nonce: String,
    /// Requested command name.
    pub cmd: String,
    /// Event the command refers to, if any.
    pub evt: Option<String>,
    /// Handler arguments; `{}` when absent or `null`.
    pub args: Map<String, Value>,
}

/// A rejected command line together with its recovered correlation data.
#[derive(Debug)]
pub struct RejectedRequest {
    /// `cmd` when the line carried it as a string.
    pub cmd: Option<String>,
    /// Nonce once it has been validated.
    pub nonce: Option<String>,
    /// Why the line was rejected.
    pub error: DispatchError,
}

impl RejectedRequest {
    fn new(error: DispatchError) -> Self {
        Self {
            cmd: None,
            nonce: None,
            error,
        }
    }
}

impl CommandRequest {
    /// Parses one inbound line.
    ///
    /// Trailing whitespace, including the newline delimiter, is ignored. Lines
    /// longer than `max_bytes` are rejected before any parsing takes place.
    ///
    /// # Errors
    ///
    /// Returns a [`RejectedRequest`] naming the first failing step.
    pub fn parse(line: &str, max_bytes: usize) -> Result<Self, RejectedRequest> {
        if line.len() > max_bytes {
            return Err(RejectedRequest::new(DispatchError::payload_too_large(
                line.len(),
                max_bytes,
            )));
        }

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return Err(RejectedRequest::new(DispatchError::malformed(
                "empty request line",
            )));
        }

        let value: Value = serde_json::from_str(trimmed)
            .map_err(|error| RejectedRequest::new(DispatchError::from_json_error(error)))?;
        let Value::Object(mut object) = value else {
            return Err(RejectedRequest::new(DispatchError::malformed(
                "top-level value is not an object",
            )));
        };

        let cmd = match object.remove("cmd") {
            Some(Value::String(name)) => Some(name),
            _ => None,
        };

        let nonce = match object.remove("nonce") {
            Some(Value::String(nonce)) if !nonce.is_empty() => nonce,
            _ => {
                return Err(RejectedRequest {
                    cmd,
                    nonce: None,
                    error: DispatchError::MissingNonce,
                });
            }
        };

        let reject = |cmd: Option<String>, nonce: String, error| RejectedRequest {
            cmd,
            nonce: Some(nonce),
            error,
        };

        let args = match object.remove("args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(args)) => args,
            Some(_) => return Err(reject(cmd, nonce, DispatchError::ArgsNotObject)),
        };

        let evt = match object.remove("evt") {
            None | Some(Value::Null) => None,
            Some(Value::String(evt)) => Some(evt),
            Some(_) => return Err(reject(cmd, nonce, DispatchError::EventNotString)),
        };

        let Some(cmd) = cmd else {
            return Err(reject(None, nonce, DispatchError::MissingCommand));
        };

        Ok(Self {
            nonce,
            cmd,
            evt,
            args,
        })
    }
}
