//! The remote-service client as seen by the bridge.
//!
//! The bridge never talks to the remote service directly. It only needs a
//! way to register listeners for named events; connection management,
//! authentication and rate limiting stay behind [`RemoteClient`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

/// Callback invoked with the raw payload of a remote event.
pub type EventListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Subscription surface offered by the remote-service client.
pub trait RemoteClient: Send + Sync + 'static {
    /// Registers `listener` for every future occurrence of `event`.
    fn on(&self, event: &str, listener: EventListener);
}

/// In-process client whose events are injected with [`LocalClient::emit`].
///
/// The binary uses it when no remote connection is configured; tests use it
/// to drive the event path.
#[derive(Default)]
pub struct LocalClient {
    listeners: Mutex<HashMap<String, Vec<EventListener>>>,
}

impl LocalClient {
    /// Creates a client with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `payload` to every listener registered for `event`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();
        for listener in &listeners {
            listener(payload.clone());
        }
        listeners.len()
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl RemoteClient for LocalClient {
    fn on(&self, event: &str, listener: EventListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_owned())
            .or_default()
            .push(listener);
    }
}

impl std::fmt::Debug for LocalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LocalClient")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
