//! Wire types exchanged between Switchyard and its host process.
//!
//! Every message on the output stream is an [`Envelope`] serialised as one
//! JSON object per line. Command responses carry `evt: null` and the nonce of
//! the request that produced them; subscription events and error
//! notifications use the reserved [`DISPATCH`] command name, with errors
//! tagged by the reserved [`ERROR_EVENT`] event name.

mod envelope;
mod error_code;

pub use envelope::{Envelope, ErrorPayload};
pub use error_code::ErrorCode;

/// Command name used for every notification that is not a direct response.
pub const DISPATCH: &str = "DISPATCH";

/// Event name carried by error envelopes.
pub const ERROR_EVENT: &str = "ERROR";

/// Event name of the startup handshake.
pub const READY_EVENT: &str = "READY";

/// Protocol version advertised in the startup handshake.
pub const PROTOCOL_VERSION: u32 = 1;
