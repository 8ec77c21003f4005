//! The set of active subscriptions.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use switchyard_protocol::Envelope;
use tracing::debug;

use super::equality::structural_eq;
use super::filter::matches;
use super::SUBSCRIPTIONS_TARGET;
use crate::output::OutputSink;

/// Callback that delivers event data to the host.
pub type Dispatcher = Arc<dyn Fn(Value) + Send + Sync>;

/// A standing request for events named `evt` whose payload matches `args`.
#[derive(Clone)]
pub struct Subscription {
    evt: String,
    args: Map<String, Value>,
    dispatch: Dispatcher,
}

impl Subscription {
    /// Event name the subscription listens for.
    #[must_use]
    pub fn evt(&self) -> &str {
        &self.evt
    }

    /// Filter values the payload must carry.
    #[must_use]
    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Delivers `data` to the host.
    pub fn dispatch(&self, data: Value) {
        (self.dispatch)(data);
    }

    fn is(&self, evt: &str, args: &Map<String, Value>) -> bool {
        self.evt == evt && maps_eq(&self.args, args)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("evt", &self.evt)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Active subscriptions, unique by event name and structurally equal args.
///
/// Entries keep registration order; fan-out visits them in that order.
pub struct SubscriptionRegistry {
    entries: Mutex<Vec<Subscription>>,
    sink: OutputSink,
}

impl SubscriptionRegistry {
    /// Creates an empty registry whose subscriptions emit through `sink`.
    #[must_use]
    pub fn new(sink: OutputSink) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            sink,
        }
    }

    /// Adds a subscription unless an equal one exists.
    ///
    /// Returns `true` when a new entry was inserted.
    pub fn add(&self, evt: &str, args: Map<String, Value>) -> bool {
        let mut entries = self.entries();
        if entries.iter().any(|entry| entry.is(evt, &args)) {
            debug!(target: SUBSCRIPTIONS_TARGET, evt, "subscription already present");
            return false;
        }

        let sink = self.sink.clone();
        let event = evt.to_owned();
        let dispatch: Dispatcher = Arc::new(move |data| {
            sink.emit(Envelope::event(event.clone(), data));
        });
        entries.push(Subscription {
            evt: evt.to_owned(),
            args,
            dispatch,
        });
        debug!(
            target: SUBSCRIPTIONS_TARGET,
            evt,
            total = entries.len(),
            "subscription added"
        );
        true
    }

    /// Removes the subscription equal to `(evt, args)`.
    ///
    /// Returns `false` when no such subscription exists.
    pub fn remove(&self, evt: &str, args: &Map<String, Value>) -> bool {
        let mut entries = self.entries();
        let Some(position) = entries.iter().position(|entry| entry.is(evt, args)) else {
            return false;
        };
        entries.remove(position);
        debug!(
            target: SUBSCRIPTIONS_TARGET,
            evt,
            total = entries.len(),
            "subscription removed"
        );
        true
    }

    /// Returns the first subscription equal to `(evt, args)`.
    #[must_use]
    pub fn get(&self, evt: &str, args: &Map<String, Value>) -> Option<Subscription> {
        self.entries()
            .iter()
            .find(|entry| entry.is(evt, args))
            .cloned()
    }

    /// Returns the subscriptions for `evt` whose filter matches `data`, in
    /// registration order.
    #[must_use]
    pub fn matching(&self, evt: &str, data: &Value) -> Vec<Subscription> {
        self.entries()
            .iter()
            .filter(|entry| entry.evt == evt && matches(data, &entry.args))
            .cloned()
            .collect()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` when no subscription is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("entries", &*self.entries())
            .finish_non_exhaustive()
    }
}

fn maps_eq(left: &Map<String, Value>, right: &Map<String, Value>) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|(key, value)| right.get(key).is_some_and(|other| structural_eq(value, other)))
}
