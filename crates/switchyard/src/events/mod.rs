//! Remote events: normalisation, duplicate suppression and fan-out.
//!
//! Each remote occurrence is normalised by the handler registered for its
//! name, checked against the [`DedupGate`] when it carries a [`DedupKey`], and
//! then dispatched to every subscription whose filter matches.

mod dedup;
mod fanout;
mod handlers;

pub use dedup::{DedupGate, DedupKey};
pub use fanout::{EventFanout, FanoutError, FanoutOutcome};
pub use handlers::{
    EventContext, EventHandler, EventRegistry, FieldEvent, GUILD_CREATE, MESSAGE_CREATE,
    MESSAGE_DELETE, MESSAGE_UPDATE, NormalizedEvent,
};

const EVENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::events");
