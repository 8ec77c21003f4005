//! A line-oriented JSON bridge between a host process and a remote
//! real-time service.
//!
//! The host writes commands to the bridge's standard input, one JSON object
//! per line, and reads responses and asynchronous events from its standard
//! output in the same framing. Every command carries a nonce that is echoed
//! in its single response, so the host can match replies to requests while
//! many commands are in flight.
//!
//! Events raised by the remote client reach the host only through
//! subscriptions. `SUBSCRIBE` with an event name and a filter object
//! registers interest; each occurrence is normalised by the handler
//! registered for its name, suppressed if its dedup key was seen within the
//! configured window, and then delivered to every subscription whose filter
//! fields are structurally equal to the payload's.
//!
//! Command handlers, event normalisers and the remote client are injected
//! when the [`Bridge`] is built, so hosts and tests can supply their own.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use switchyard::{
//!     Bridge, BridgeSettings, CommandContext, CommandRegistry, EventRegistry, FnCommand,
//!     HandledError, LocalClient, OutputSink,
//! };
//!
//! # async fn demo() {
//! let (sink, _receiver) = OutputSink::channel();
//! let commands = CommandRegistry::with_builtins().register(
//!     "PING",
//!     FnCommand::new(|_: CommandContext<LocalClient>| async {
//!         Ok::<_, HandledError>(json!({ "pong": true }))
//!     }),
//! );
//! let bridge = Bridge::new(
//!     Arc::new(LocalClient::new()),
//!     commands,
//!     EventRegistry::standard(),
//!     BridgeSettings::default(),
//!     sink,
//! );
//! let reply = bridge.dispatch(r#"{"nonce":"1","cmd":"PING"}"#).await;
//! assert_eq!(reply.data, json!({ "pong": true }));
//! # }
//! ```

mod bootstrap;
mod bridge;
pub mod dispatch;
mod error;
pub mod events;
mod health;
mod input;
mod output;
mod process;
mod remote;
pub mod subscriptions;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, Startup, SystemConfigLoader, bootstrap_with,
};
pub use bridge::{Bridge, BridgeApi, BridgeSettings};
pub use dispatch::{
    ArgsSchema, Command, CommandContext, CommandRegistry, DispatchError, FnCommand, ValueKind,
};
pub use error::HandledError;
pub use events::{DedupGate, DedupKey, EventHandler, EventRegistry, FieldEvent, NormalizedEvent};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use input::{InputLine, LineReader};
pub use output::{OutputError, OutputReceiver, OutputSink, ResponseWriter};
pub use process::{ProcessError, run, run_bridge, run_with, serve};
pub use remote::{EventListener, LocalClient, RemoteClient};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
