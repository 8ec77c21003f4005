//! Delivery of normalised remote events to matching subscriptions.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use super::EVENTS_TARGET;
use super::dedup::DedupGate;
use super::handlers::{EventContext, EventRegistry};
use crate::error::HandledError;
use crate::subscriptions::SubscriptionRegistry;

/// Result of publishing one event occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutOutcome {
    /// The event reached this many subscriptions.
    Delivered(usize),
    /// The dedup gate discarded the event.
    Suppressed,
}

/// Failures raised while publishing an event.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// No handler is registered for the event; a wiring bug.
    #[error("no event handler registered for {event}")]
    UnknownEvent {
        /// Offending event name.
        event: String,
    },
    /// The handler could not normalise the payload.
    #[error("event handler for {event} failed: {source}")]
    Handler {
        /// Event being normalised.
        event: String,
        /// Error raised by the handler.
        #[source]
        source: HandledError,
    },
}

/// Normalises remote events and hands them to subscriptions.
#[derive(Debug)]
pub struct EventFanout {
    handlers: EventRegistry,
    subscriptions: Arc<SubscriptionRegistry>,
    dedup: DedupGate,
}

impl EventFanout {
    /// Wires the handler registry, subscriptions and dedup gate together.
    #[must_use]
    pub const fn new(
        handlers: EventRegistry,
        subscriptions: Arc<SubscriptionRegistry>,
        dedup: DedupGate,
    ) -> Self {
        Self {
            handlers,
            subscriptions,
            dedup,
        }
    }

    /// Publishes one occurrence of `event`.
    ///
    /// Delivery is synchronous and follows registration order.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError::UnknownEvent`] when `event` has no handler and
    /// [`FanoutError::Handler`] when normalisation fails.
    pub fn publish(&self, event: &str, payload: Value) -> Result<FanoutOutcome, FanoutError> {
        let handler = self
            .handlers
            .get(event)
            .ok_or_else(|| FanoutError::UnknownEvent {
                event: event.to_owned(),
            })?;

        let normalized = handler
            .handle(EventContext { event, payload })
            .map_err(|source| FanoutError::Handler {
                event: event.to_owned(),
                source,
            })?;

        if let Some(key) = &normalized.dedup_key {
            if self.dedup.should_suppress(&key.scoped(event)) {
                debug!(target: EVENTS_TARGET, event, key = %key, "suppressed duplicate event");
                return Ok(FanoutOutcome::Suppressed);
            }
        }

        let targets = self.subscriptions.matching(event, &normalized.data);
        for subscription in &targets {
            subscription.dispatch(normalized.data.clone());
        }
        trace!(
            target: EVENTS_TARGET,
            event,
            delivered = targets.len(),
            "event fanned out"
        );
        Ok(FanoutOutcome::Delivered(targets.len()))
    }
}
