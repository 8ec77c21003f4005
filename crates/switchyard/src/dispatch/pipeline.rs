//! The command pipeline: parse, resolve, validate, invoke, respond.
//!
//! Every inbound line yields exactly one [`Envelope`]. Failures at any step,
//! including a handler panic, are converted into an `ERROR` envelope instead
//! of escaping to the caller.

use std::sync::Arc;

use serde_json::{Map, Value};
use switchyard_protocol::Envelope;
use tracing::{debug, warn};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::registry::{CommandContext, CommandRegistry};
use super::request::{CommandRequest, RejectedRequest};
use crate::bridge::BridgeApi;
use crate::remote::RemoteClient;

/// Turns inbound command lines into response envelopes.
#[derive(Debug)]
pub struct CommandPipeline<C: RemoteClient> {
    commands: CommandRegistry<C>,
    client: Arc<C>,
    api: BridgeApi,
    max_message_bytes: usize,
}

impl<C: RemoteClient> CommandPipeline<C> {
    /// Builds a pipeline over `commands`.
    #[must_use]
    pub const fn new(
        commands: CommandRegistry<C>,
        client: Arc<C>,
        api: BridgeApi,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            commands,
            client,
            api,
            max_message_bytes,
        }
    }

    /// Runs one command line through every step and returns its envelope.
    pub async fn dispatch(&self, raw: &str) -> Envelope {
        let request = match CommandRequest::parse(raw, self.max_message_bytes) {
            Ok(request) => request,
            Err(RejectedRequest { cmd, nonce, error }) => {
                return error_envelope(cmd.as_deref(), nonce.as_deref(), error);
            }
        };

        let CommandRequest {
            nonce,
            cmd,
            evt,
            args,
        } = request;
        debug!(
            target: DISPATCH_TARGET,
            cmd = cmd.as_str(),
            nonce = nonce.as_str(),
            "dispatching command"
        );

        match self.invoke(&cmd, &nonce, evt, args).await {
            Ok(data) => {
                debug!(
                    target: DISPATCH_TARGET,
                    cmd = cmd.as_str(),
                    nonce = nonce.as_str(),
                    "command succeeded"
                );
                Envelope::response(cmd, nonce, data)
            }
            Err(error) => error_envelope(Some(&cmd), Some(&nonce), error),
        }
    }

    async fn invoke(
        &self,
        cmd: &str,
        nonce: &str,
        evt: Option<String>,
        args: Map<String, Value>,
    ) -> Result<Value, DispatchError> {
        let command = self
            .commands
            .resolve(cmd)
            .ok_or_else(|| DispatchError::unknown_command(cmd))?;

        if let Some(schema) = command.validation() {
            schema.validate(&args)?;
        }

        let ctx = CommandContext {
            bridge: self.api.clone(),
            client: Arc::clone(&self.client),
            cmd: cmd.to_owned(),
            evt,
            nonce: nonce.to_owned(),
            args,
        };

        // A panicking handler only tears down its own task.
        let task = tokio::spawn(async move { command.handle(ctx).await });
        match task.await {
            Ok(result) => Ok(result?),
            Err(error) => Err(DispatchError::from_join_error(error)),
        }
    }

    /// The registry this pipeline resolves against.
    #[must_use]
    pub const fn commands(&self) -> &CommandRegistry<C> {
        &self.commands
    }
}

/// Logs `error` and renders it as an `ERROR` envelope.
pub(crate) fn error_envelope(cmd: Option<&str>, nonce: Option<&str>, error: DispatchError) -> Envelope {
    warn!(
        target: DISPATCH_TARGET,
        cmd,
        nonce,
        code = %error.code(),
        %error,
        "command failed"
    );
    Envelope::error(cmd, nonce, error.into_handled().into_payload())
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;
    use switchyard_protocol::{DISPATCH, ERROR_EVENT, ErrorCode, ErrorPayload};

    use super::*;
    use crate::dispatch::registry::FnCommand;
    use crate::dispatch::schema::{ArgsSchema, ValueKind};
    use crate::error::HandledError;
    use crate::events::EventRegistry;
    use crate::output::OutputSink;
    use crate::remote::LocalClient;
    use crate::subscriptions::SubscriptionRegistry;

    fn commands() -> CommandRegistry<LocalClient> {
        CommandRegistry::with_builtins()
            .register(
                "PING",
                FnCommand::new(|_: CommandContext<LocalClient>| async {
                    Ok::<_, HandledError>(json!({ "pong": true }))
                }),
            )
            .register(
                "ECHO",
                FnCommand::new(|ctx: CommandContext<LocalClient>| async move {
                    Ok::<_, HandledError>(json!({ "evt": ctx.evt, "args": ctx.args }))
                })
                .with_schema(ArgsSchema::new().required("count", ValueKind::Number)),
            )
            .register(
                "REFUSE",
                FnCommand::new(|_: CommandContext<LocalClient>| async {
                    Err::<Value, _>(HandledError::new("RATE_LIMITED", "slow down"))
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

    #[fixture]
    fn pipeline() -> CommandPipeline<LocalClient> {
        let (sink, _receiver) = OutputSink::channel();
        let api = BridgeApi::new(
            Arc::new(SubscriptionRegistry::new(sink.clone())),
            Arc::new(EventRegistry::standard().names().map(str::to_owned).collect()),
            sink,
        );
        CommandPipeline::new(commands(), Arc::new(LocalClient::new()), api, 256)
    }

    fn error_of(envelope: &Envelope) -> ErrorPayload {
        assert_eq!(envelope.evt.as_deref(), Some(ERROR_EVENT));
        envelope.error_payload().expect("error payload")
    }

    #[rstest]
    #[tokio::test]
    async fn ping_round_trips_to_the_exact_wire_line(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline.dispatch(r#"{"nonce":"1","cmd":"PING"}"#).await;
        let line = serde_json::to_string(&envelope).expect("serialise");
        assert_eq!(
            line,
            r#"{"cmd":"PING","data":{"pong":true},"evt":null,"nonce":"1"}"#
        );
    }

    #[rstest]
    #[case::garbage("{not json")]
    #[case::array("[]")]
    #[case::number("42")]
    #[tokio::test]
    async fn malformed_json_has_null_nonce(
        pipeline: CommandPipeline<LocalClient>,
        #[case] line: &str,
    ) {
        let envelope = pipeline.dispatch(line).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidPayload);
        assert_eq!(error.message, "Invalid payload, expected json");
        assert_eq!(envelope.nonce, None);
        assert_eq!(envelope.cmd, DISPATCH);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_nonce_has_null_nonce(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline.dispatch(r#"{"cmd":"PING"}"#).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidPayload);
        assert_eq!(error.message, "Payload requires a nonce");
        assert_eq!(envelope.nonce, None);
        assert_eq!(envelope.cmd, "PING");
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_commands_report_their_name(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline.dispatch(r#"{"nonce":"7","cmd":"FROBNICATE"}"#).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidCommand);
        assert_eq!(error.message, "FROBNICATE");
        assert_eq!(envelope.nonce.as_deref(), Some("7"));
        assert_eq!(envelope.cmd, "FROBNICATE");
    }

    #[rstest]
    #[tokio::test]
    async fn missing_cmd_falls_back_to_dispatch(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline.dispatch(r#"{"nonce":"7"}"#).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidCommand);
        assert_eq!(error.message, "missing cmd");
        assert_eq!(envelope.cmd, DISPATCH);
        assert_eq!(envelope.nonce.as_deref(), Some("7"));
    }

    #[rstest]
    #[case::missing(r#"{"nonce":"2","cmd":"ECHO"}"#, "\"count\" is required")]
    #[case::no_coercion(r#"{"nonce":"2","cmd":"ECHO","args":{"count":"42"}}"#, "\"count\" must be a number")]
    #[tokio::test]
    async fn schema_failures_are_invalid_payload(
        pipeline: CommandPipeline<LocalClient>,
        #[case] line: &str,
        #[case] message: &str,
    ) {
        let envelope = pipeline.dispatch(line).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidPayload);
        assert_eq!(error.message, message);
        assert_eq!(envelope.nonce.as_deref(), Some("2"));
    }

    #[rstest]
    #[tokio::test]
    async fn handlers_see_evt_and_args(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline
            .dispatch(r#"{"nonce":"3","cmd":"ECHO","evt":"X","args":{"count":1}}"#)
            .await;
        assert_eq!(envelope.evt, None);
        assert_eq!(envelope.data, json!({ "evt": "X", "args": { "count": 1 } }));
    }

    #[rstest]
    #[tokio::test]
    async fn handler_codes_propagate_unchanged(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline.dispatch(r#"{"nonce":"4","cmd":"REFUSE"}"#).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::Custom("RATE_LIMITED".to_owned()));
        assert_eq!(error.message, "slow down");
        assert_eq!(envelope.cmd, "REFUSE");
    }

    #[rstest]
    #[tokio::test]
    async fn handler_panics_become_unknown_errors(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline.dispatch(r#"{"nonce":"5","cmd":"EXPLODE"}"#).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::UnknownError);
        assert_eq!(error.message, "handler exploded");
        assert_eq!(envelope.nonce.as_deref(), Some("5"));
    }

    #[rstest]
    #[tokio::test]
    async fn oversized_lines_are_rejected(pipeline: CommandPipeline<LocalClient>) {
        let line = format!(r#"{{"nonce":"6","cmd":"PING","args":{{"pad":"{}"}}}}"#, "x".repeat(512));
        let envelope = pipeline.dispatch(&line).await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidPayload);
        assert_eq!(error.message, "Payload exceeds 256 byte limit");
        assert_eq!(envelope.nonce, None);
    }

    #[rstest]
    #[tokio::test]
    async fn subscribe_requires_a_registered_event(pipeline: CommandPipeline<LocalClient>) {
        let envelope = pipeline
            .dispatch(r#"{"nonce":"8","cmd":"SUBSCRIBE","evt":"TYPING_START"}"#)
            .await;
        let error = error_of(&envelope);
        assert_eq!(error.code, ErrorCode::InvalidEvent);
        assert_eq!(envelope.cmd, "SUBSCRIBE");
    }
}
