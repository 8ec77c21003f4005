//! `SUBSCRIBE` and `UNSUBSCRIBE`, the commands every bridge carries.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::DISPATCH_TARGET;
use super::registry::{Command, CommandContext};
use crate::error::HandledError;
use crate::remote::RemoteClient;

/// Name of the command that registers a subscription.
pub const SUBSCRIBE: &str = "SUBSCRIBE";
/// Name of the command that drops a subscription.
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";

/// Registers `(evt, args)` as a subscription.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subscribe;

/// Removes the `(evt, args)` subscription if present.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsubscribe;

/// Returns the event a subscription command targets, checking that the
/// bridge forwards it.
fn subscribed_event<C>(ctx: &CommandContext<C>) -> Result<&str, HandledError> {
    let evt = ctx.evt.as_deref().ok_or_else(|| {
        HandledError::invalid_payload(format!("{} requires an evt", ctx.cmd))
    })?;
    if ctx.bridge.has_event(evt) {
        Ok(evt)
    } else {
        Err(HandledError::invalid_event(evt))
    }
}

#[async_trait]
impl<C: RemoteClient> Command<C> for Subscribe {
    async fn handle(&self, ctx: CommandContext<C>) -> Result<Value, HandledError> {
        let evt = subscribed_event(&ctx)?.to_owned();
        let inserted = ctx.bridge.add_subscription(&evt, ctx.args);
        debug!(target: DISPATCH_TARGET, evt = evt.as_str(), inserted, "subscribe");
        Ok(json!({ "evt": evt }))
    }
}

#[async_trait]
impl<C: RemoteClient> Command<C> for Unsubscribe {
    async fn handle(&self, ctx: CommandContext<C>) -> Result<Value, HandledError> {
        let evt = subscribed_event(&ctx)?;
        let removed = ctx.bridge.remove_subscription(evt, &ctx.args);
        debug!(target: DISPATCH_TARGET, evt, removed, "unsubscribe");
        Ok(json!({ "evt": evt }))
    }
}
