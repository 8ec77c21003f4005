//! Composition root tying the command pipeline and event fan-out together.
//!
//! A [`Bridge`] owns the subscription registry and dedup gate, registers a
//! listener on the remote client for every event it can normalise, and
//! routes both command responses and event notifications into one
//! [`OutputSink`].

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use switchyard_config::{
    Config, ConfigError, DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_WINDOW_MS,
    DEFAULT_MAX_MESSAGE_BYTES,
};
use switchyard_protocol::Envelope;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::dispatch::{CommandPipeline, CommandRegistry, DispatchError, error_envelope, panic_message};
use crate::error::HandledError;
use crate::events::{DedupGate, EventFanout, EventRegistry, FanoutError};
use crate::output::OutputSink;
use crate::remote::{EventListener, RemoteClient};
use crate::subscriptions::{Subscription, SubscriptionRegistry};

const BRIDGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bridge");

/// Tunables resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// How long a dedup key suppresses repeats.
    pub dedup_window: Duration,
    /// Most dedup keys remembered at once.
    pub dedup_capacity: NonZeroUsize,
    /// Longest accepted inbound line in bytes.
    pub max_message_bytes: usize,
}

impl BridgeSettings {
    /// Extracts bridge settings from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration violates an
    /// invariant.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dedup_window: config.dedup_window(),
            dedup_capacity: config.dedup_capacity()?,
            max_message_bytes: config.max_message_bytes(),
        })
    }

    /// Configuration advertised in the READY handshake.
    #[must_use]
    pub fn summary(&self) -> Value {
        let window_ms = u64::try_from(self.dedup_window.as_millis()).unwrap_or(u64::MAX);
        json!({
            "dedup_window_ms": window_ms,
            "dedup_capacity": self.dedup_capacity.get(),
            "max_message_bytes": self.max_message_bytes,
        })
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_millis(DEFAULT_DEDUP_WINDOW_MS),
            dedup_capacity: NonZeroUsize::new(DEFAULT_DEDUP_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Subscription and event surface handed to command handlers.
#[derive(Debug, Clone)]
pub struct BridgeApi {
    subscriptions: Arc<SubscriptionRegistry>,
    events: Arc<BTreeSet<String>>,
    sink: OutputSink,
}

impl BridgeApi {
    /// Builds an API over a registry, the forwarded event names and a sink.
    #[must_use]
    pub const fn new(
        subscriptions: Arc<SubscriptionRegistry>,
        events: Arc<BTreeSet<String>>,
        sink: OutputSink,
    ) -> Self {
        Self {
            subscriptions,
            events,
            sink,
        }
    }

    /// Adds `(evt, args)` unless an equal subscription exists.
    pub fn add_subscription(&self, evt: &str, args: Map<String, Value>) -> bool {
        self.subscriptions.add(evt, args)
    }

    /// Removes the `(evt, args)` subscription.
    pub fn remove_subscription(&self, evt: &str, args: &Map<String, Value>) -> bool {
        self.subscriptions.remove(evt, args)
    }

    /// Looks up the `(evt, args)` subscription.
    #[must_use]
    pub fn get_subscription(&self, evt: &str, args: &Map<String, Value>) -> Option<Subscription> {
        self.subscriptions.get(evt, args)
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the bridge forwards `evt` from the remote client.
    #[must_use]
    pub fn has_event(&self, evt: &str) -> bool {
        self.events.contains(evt)
    }

    /// Names of the forwarded events, sorted.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    /// Emits a `DISPATCH` envelope for `evt` outside any subscription.
    pub fn emit_event(&self, evt: &str, data: Value) {
        self.sink.emit(Envelope::event(evt, data));
    }

    /// Reports a failure that belongs to no command as an `ERROR` envelope
    /// with a `null` nonce.
    pub fn report_failure(&self, error: HandledError) {
        self.sink.emit(Envelope::error(None, None, error.into_payload()));
    }

    /// The output sink every envelope goes through.
    #[must_use]
    pub const fn sink(&self) -> &OutputSink {
        &self.sink
    }
}

/// The bridge between the host's command stream and the remote client.
pub struct Bridge<C: RemoteClient> {
    inner: Arc<BridgeInner<C>>,
}

struct BridgeInner<C: RemoteClient> {
    pipeline: CommandPipeline<C>,
    api: BridgeApi,
    settings: BridgeSettings,
}

impl<C: RemoteClient> Bridge<C> {
    /// Wires `client` events into fan-out and prepares the command pipeline.
    ///
    /// A listener is registered for every event `events` can normalise;
    /// other remote events are never observed.
    #[must_use]
    pub fn new(
        client: Arc<C>,
        commands: CommandRegistry<C>,
        events: EventRegistry,
        settings: BridgeSettings,
        sink: OutputSink,
    ) -> Self {
        let subscriptions = Arc::new(SubscriptionRegistry::new(sink.clone()));
        let names: BTreeSet<String> = events.names().map(str::to_owned).collect();
        let api = BridgeApi::new(Arc::clone(&subscriptions), Arc::new(names), sink);

        let dedup = DedupGate::new(settings.dedup_window, settings.dedup_capacity);
        let fanout = Arc::new(EventFanout::new(events, subscriptions, dedup));
        for name in api.event_names() {
            client.on(name, event_listener(name, Arc::clone(&fanout), api.clone()));
        }

        let pipeline =
            CommandPipeline::new(commands, client, api.clone(), settings.max_message_bytes);
        Self {
            inner: Arc::new(BridgeInner {
                pipeline,
                api,
                settings,
            }),
        }
    }

    /// Emits the READY handshake.
    pub fn ready(&self) {
        let config = self.inner.settings.summary();
        info!(target: BRIDGE_TARGET, %config, "bridge ready");
        self.inner.api.sink().emit(Envelope::ready(config));
    }

    /// Dispatches `raw` on its own task and writes the outcome to the sink.
    ///
    /// The handle resolves once the envelope has been queued; it carries no
    /// result of its own.
    pub fn handle(&self, raw: String) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let envelope = inner.pipeline.dispatch(&raw).await;
            inner.api.sink().emit(envelope);
        })
    }

    /// Runs `raw` through the pipeline and returns its envelope without
    /// writing it.
    pub async fn dispatch(&self, raw: &str) -> Envelope {
        self.inner.pipeline.dispatch(raw).await
    }

    /// The API handed to command handlers.
    #[must_use]
    pub fn api(&self) -> &BridgeApi {
        &self.inner.api
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &BridgeSettings {
        &self.inner.settings
    }

    /// Answers a line refused before dispatch with a `null` nonce.
    pub fn reject(&self, error: DispatchError) {
        self.inner.api.sink().emit(error_envelope(None, None, error));
    }

    /// Reports a process-level failure with a `null` nonce.
    pub fn report_failure(&self, error: HandledError) {
        self.inner.api.report_failure(error);
    }
}

impl<C: RemoteClient> Clone for Bridge<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RemoteClient> fmt::Debug for Bridge<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("settings", &self.inner.settings)
            .field("commands", self.inner.pipeline.commands())
            .field("api", &self.inner.api)
            .finish()
    }
}

/// Builds the remote-client listener that feeds `event` into fan-out.
///
/// Panics raised while normalising or delivering are contained here so they
/// never unwind into the remote client.
fn event_listener(event: &str, fanout: Arc<EventFanout>, api: BridgeApi) -> EventListener {
    let event = event.to_owned();
    Arc::new(move |payload: Value| {
        let published = panic::catch_unwind(AssertUnwindSafe(|| fanout.publish(&event, payload)));
        match published {
            Ok(Ok(outcome)) => {
                trace!(target: BRIDGE_TARGET, event = event.as_str(), ?outcome, "event published");
            }
            Ok(Err(FanoutError::UnknownEvent { event })) => {
                error!(
                    target: BRIDGE_TARGET,
                    event = event.as_str(),
                    "no handler for forwarded event; dropping"
                );
            }
            Ok(Err(FanoutError::Handler { event, source })) => {
                warn!(
                    target: BRIDGE_TARGET,
                    event = event.as_str(),
                    error = %source,
                    "event handler failed"
                );
                api.report_failure(source);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    target: BRIDGE_TARGET,
                    event = event.as_str(),
                    message = message.as_str(),
                    "event listener panicked"
                );
                api.report_failure(HandledError::unknown(message));
            }
        }
    })
}
