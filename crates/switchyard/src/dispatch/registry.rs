//! Command handlers and the name-keyed registry that resolves them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::builtin::{SUBSCRIBE, Subscribe, UNSUBSCRIBE, Unsubscribe};
use super::schema::ArgsSchema;
use crate::bridge::BridgeApi;
use crate::error::HandledError;
use crate::remote::RemoteClient;

/// Everything a handler may use while serving one command.
pub struct CommandContext<C> {
    /// Subscription and event API of the owning bridge.
    pub bridge: BridgeApi,
    /// The remote-service client.
    pub client: Arc<C>,
    /// Name the command was invoked under.
    pub cmd: String,
    /// Event named by the command, if any.
    pub evt: Option<String>,
    /// Correlation token of the request.
    pub nonce: String,
    /// Validated arguments; empty when the request carried none.
    pub args: Map<String, Value>,
}

impl<C> fmt::Debug for CommandContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("cmd", &self.cmd)
            .field("evt", &self.evt)
            .field("nonce", &self.nonce)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A named operation the host can invoke.
#[async_trait]
pub trait Command<C: RemoteClient>: Send + Sync {
    /// Schema the request's `args` must satisfy before [`Command::handle`]
    /// runs. `None` skips validation.
    fn validation(&self) -> Option<&ArgsSchema> {
        None
    }

    /// Serves one request and returns the response `data`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandledError`] whose code and message are sent to the host
    /// unchanged.
    async fn handle(&self, ctx: CommandContext<C>) -> Result<Value, HandledError>;
}

/// Adapts an async closure into a [`Command`].
pub struct FnCommand<F> {
    handler: F,
    schema: Option<ArgsSchema>,
}

impl<F> FnCommand<F> {
    /// Wraps `handler` without validation.
    pub const fn new(handler: F) -> Self {
        Self {
            handler,
            schema: None,
        }
    }

    /// Validates `args` against `schema` before invoking the handler.
    #[must_use]
    pub fn with_schema(mut self, schema: ArgsSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl<F> fmt::Debug for FnCommand<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C, F, Fut> Command<C> for FnCommand<F>
where
    C: RemoteClient,
    F: Fn(CommandContext<C>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandledError>> + Send,
{
    fn validation(&self) -> Option<&ArgsSchema> {
        self.schema.as_ref()
    }

    async fn handle(&self, ctx: CommandContext<C>) -> Result<Value, HandledError> {
        (self.handler)(ctx).await
    }
}

/// Immutable-after-construction lookup of commands by name.
pub struct CommandRegistry<C: RemoteClient> {
    commands: HashMap<String, Arc<dyn Command<C>>>,
}

impl<C: RemoteClient> CommandRegistry<C> {
    /// A registry with no commands, not even the subscription built-ins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// A registry holding `SUBSCRIBE` and `UNSUBSCRIBE`.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new()
            .register(SUBSCRIBE, Subscribe)
            .register(UNSUBSCRIBE, Unsubscribe)
    }

    /// Adds or replaces the command registered under `name`.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, command: impl Command<C> + 'static) -> Self {
        self.commands.insert(name.into(), Arc::new(command));
        self
    }

    /// Looks up a command by exact name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Command<C>>> {
        self.commands.get(name).cloned()
    }

    /// Registered command names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<C: RemoteClient> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RemoteClient> fmt::Debug for CommandRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}
