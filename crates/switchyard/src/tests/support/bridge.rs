//! A bridge wired to a [`LocalClient`] plus helpers for driving it.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use switchyard_protocol::Envelope;
use tokio::runtime::Runtime;

use crate::bridge::{Bridge, BridgeSettings};
use crate::dispatch::{CommandContext, CommandRegistry, FnCommand};
use crate::error::HandledError;
use crate::events::EventRegistry;
use crate::output::{OutputReceiver, OutputSink};
use crate::remote::LocalClient;

/// Built-ins plus `PING`, which answers `{ "pong": true }`, and `EXPLODE`,
/// which panics.
#[must_use]
fn test_commands() -> CommandRegistry<LocalClient> {
    CommandRegistry::with_builtins()
        .register(
            "PING",
            FnCommand::new(|_: CommandContext<LocalClient>| async {
                Ok::<_, HandledError>(json!({ "pong": true }))
            }),
        )
        .register(
            "EXPLODE",
            FnCommand::new(|_: CommandContext<LocalClient>| async {
                if true {
                    panic!("handler exploded");
                }
                Ok::<_, HandledError>(Value::Null)
            }),
        )
}

/// Builds a bridge over the test commands and the standard events.
#[must_use]
pub fn test_bridge(
    settings: BridgeSettings,
) -> (Bridge<LocalClient>, OutputReceiver, Arc<LocalClient>) {
    let (sink, receiver) = OutputSink::channel();
    let client = Arc::new(LocalClient::new());
    let bridge = Bridge::new(
        Arc::clone(&client),
        test_commands(),
        EventRegistry::standard(),
        settings,
        sink,
    );
    (bridge, receiver, client)
}

/// Scenario world driving a bridge on a private runtime.
pub struct BridgeWorld {
    runtime: Runtime,
    bridge: Bridge<LocalClient>,
    client: Arc<LocalClient>,
    receiver: OutputReceiver,
    output: Vec<Envelope>,
}

impl BridgeWorld {
    /// A bridge with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(BridgeSettings::default())
    }

    /// A bridge with custom settings.
    #[must_use]
    pub fn with_settings(settings: BridgeSettings) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build test runtime");
        let (bridge, receiver, client) = test_bridge(settings);
        Self {
            runtime,
            bridge,
            client,
            receiver,
            output: Vec::new(),
        }
    }

    /// Replaces the bridge with one using a shorter dedup window.
    pub fn use_dedup_window(&mut self, window: Duration) {
        let settings = BridgeSettings {
            dedup_window: window,
            ..BridgeSettings::default()
        };
        *self = Self::with_settings(settings);
    }

    /// Sends one command line and waits for its envelope.
    pub fn send(&mut self, line: &str) {
        let bridge = self.bridge.clone();
        let line = line.to_owned();
        self.runtime
            .block_on(async move { bridge.handle(line).await })
            .expect("command task");
        self.collect();
    }

    /// Raises a remote event through the client.
    pub fn emit(&mut self, event: &str, payload: &Value) {
        self.client.emit(event, payload);
        self.collect();
    }

    /// Discards everything written so far.
    pub fn clear_output(&mut self) {
        self.collect();
        self.output.clear();
    }

    /// Envelopes written since the last [`BridgeWorld::clear_output`].
    #[must_use]
    pub fn output(&self) -> &[Envelope] {
        &self.output
    }

    /// Envelopes dispatched for `event`.
    #[must_use]
    pub fn events_named(&self, event: &str) -> Vec<&Envelope> {
        self.output
            .iter()
            .filter(|envelope| envelope.evt.as_deref() == Some(event))
            .collect()
    }

    fn collect(&mut self) {
        self.output.extend(self.receiver.drain());
    }
}

/// Cloneable in-memory writer shared with the output task.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Parses every line written so far.
    #[must_use]
    pub fn envelopes(&self) -> Vec<Envelope> {
        let bytes = self.bytes.lock().expect("buffer mutex poisoned");
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| serde_json::from_str(line).expect("envelope line"))
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("buffer mutex poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
