//! Normalisation of raw remote events into subscriber payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::dedup::DedupKey;
use crate::error::HandledError;

/// Event name of a guild becoming available.
pub const GUILD_CREATE: &str = "GUILD_CREATE";
/// Event name of a new message.
pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
/// Event name of an edited message.
pub const MESSAGE_UPDATE: &str = "MESSAGE_UPDATE";
/// Event name of a deleted message.
pub const MESSAGE_DELETE: &str = "MESSAGE_DELETE";

/// Input handed to an [`EventHandler`].
#[derive(Debug)]
pub struct EventContext<'a> {
    /// Name of the remote event.
    pub event: &'a str,
    /// Raw payload as received from the remote client.
    pub payload: Value,
}

/// A payload ready for fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    /// Data delivered to matching subscribers.
    pub data: Value,
    /// Identity of this occurrence for duplicate suppression.
    pub dedup_key: Option<DedupKey>,
}

impl NormalizedEvent {
    /// An event without a dedup key.
    #[must_use]
    pub const fn new(data: Value) -> Self {
        Self {
            data,
            dedup_key: None,
        }
    }

    /// Attaches a dedup key.
    #[must_use]
    pub fn with_dedup_key(mut self, key: impl Into<DedupKey>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

/// Turns a raw remote payload into subscriber data.
pub trait EventHandler: Send + Sync {
    /// Normalises one occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload cannot be normalised.
    fn handle(&self, ctx: EventContext<'_>) -> Result<NormalizedEvent, HandledError>;
}

impl<F> EventHandler for F
where
    F: Fn(EventContext<'_>) -> Result<NormalizedEvent, HandledError> + Send + Sync,
{
    fn handle(&self, ctx: EventContext<'_>) -> Result<NormalizedEvent, HandledError> {
        self(ctx)
    }
}

/// Passes the payload through and keys it by selected fields.
///
/// The dedup key joins the configured fields' values with `:`. When any of
/// them is missing the occurrence carries no key and is never suppressed.
#[derive(Debug, Clone, Default)]
pub struct FieldEvent {
    dedup_fields: Vec<String>,
}

impl FieldEvent {
    /// A pass-through handler with no dedup key.
    #[must_use]
    pub const fn passthrough() -> Self {
        Self {
            dedup_fields: Vec::new(),
        }
    }

    /// A pass-through handler keyed by `fields`.
    #[must_use]
    pub fn keyed_by(fields: &[&str]) -> Self {
        Self {
            dedup_fields: fields.iter().map(|field| (*field).to_owned()).collect(),
        }
    }

    fn dedup_key(&self, payload: &Value) -> Option<DedupKey> {
        if self.dedup_fields.is_empty() {
            return None;
        }
        let parts = self
            .dedup_fields
            .iter()
            .map(|field| payload.get(field).and_then(key_part))
            .collect::<Option<Vec<_>>>()?;
        Some(DedupKey::from(parts.join(":")))
    }
}

fn key_part(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

impl EventHandler for FieldEvent {
    fn handle(&self, ctx: EventContext<'_>) -> Result<NormalizedEvent, HandledError> {
        let dedup_key = self.dedup_key(&ctx.payload);
        Ok(NormalizedEvent {
            data: ctx.payload,
            dedup_key,
        })
    }
}

/// Immutable lookup of event handlers by event name.
#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: BTreeMap<String, Arc<dyn EventHandler>>,
}

impl EventRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for the guild and message events the bridge forwards.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .register(GUILD_CREATE, FieldEvent::passthrough())
            .register(MESSAGE_CREATE, FieldEvent::keyed_by(&["id"]))
            .register(MESSAGE_UPDATE, FieldEvent::keyed_by(&["id", "edited_timestamp"]))
            .register(MESSAGE_DELETE, FieldEvent::keyed_by(&["id"]))
    }

    /// Adds or replaces the handler for `event`.
    #[must_use]
    pub fn register(mut self, event: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        self.handlers.insert(event.into(), Arc::new(handler));
        self
    }

    /// Looks up the handler for `event`.
    #[must_use]
    pub fn get(&self, event: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(event)
    }

    /// Returns `true` when `event` has a handler.
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Registered event names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
