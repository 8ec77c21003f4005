//! Command dispatch for the host-facing JSON line protocol.
//!
//! ## Protocol
//!
//! The host writes one command per line:
//!
//! ```json
//! {"nonce":"1","cmd":"SUBSCRIBE","evt":"MESSAGE_CREATE","args":{"guild_id":"42"}}
//! ```
//!
//! and receives exactly one envelope carrying the same nonce:
//!
//! ```json
//! {"cmd":"SUBSCRIBE","data":{"evt":"MESSAGE_CREATE"},"evt":null,"nonce":"1"}
//! ```
//!
//! Failures are reported as `ERROR` envelopes whose `data` is
//! `{ "code", "message" }`. When the failing line never produced a usable
//! nonce, the envelope's nonce is `null`.

mod builtin;
mod errors;
mod pipeline;
mod registry;
mod request;
mod schema;

pub use self::builtin::{SUBSCRIBE, Subscribe, UNSUBSCRIBE, Unsubscribe};
pub use self::errors::DispatchError;
pub use self::pipeline::CommandPipeline;
pub use self::registry::{Command, CommandContext, CommandRegistry, FnCommand};
pub use self::request::{CommandRequest, RejectedRequest};
pub use self::schema::{ArgsSchema, KindName, SchemaError, ValueKind};

pub(crate) use self::errors::panic_message;
pub(crate) use self::pipeline::error_envelope;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
