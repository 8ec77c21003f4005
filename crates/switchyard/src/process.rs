//! The bridge process: stdin in, stdout out.
//!
//! [`run`] bootstraps configuration and telemetry, emits the READY handshake,
//! then feeds every input line to the bridge until end of input. In-flight
//! commands are awaited and the output writer is drained before exit.

use std::io::{self, Write};
use std::panic;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::bridge::Bridge;
use crate::dispatch::CommandRegistry;
use crate::error::HandledError;
use crate::events::EventRegistry;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::input::{InputLine, LineReader};
use crate::output::{OutputError, OutputReceiver, OutputSink};
use crate::remote::{LocalClient, RemoteClient};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that end the bridge process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Reading the input stream failed.
    #[error("failed to read input: {source}")]
    Input {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the output stream failed.
    #[error("failed to write output: {source}")]
    Output {
        /// Underlying writer error.
        #[source]
        source: OutputError,
    },
    /// The writer task panicked or was cancelled.
    #[error("output writer task failed: {source}")]
    Writer {
        /// Underlying join error.
        #[source]
        source: JoinError,
    },
    /// The writer did not drain in time.
    #[error("output writer did not finish within {timeout:?}")]
    WriterTimeout {
        /// How long shutdown waited.
        timeout: Duration,
    },
    /// The async runtime could not be built.
    #[error("failed to start async runtime: {source}")]
    Runtime {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Runs the bridge binary with system configuration.
#[must_use]
pub fn run() -> ExitCode {
    run_with(&SystemConfigLoader, Arc::new(StructuredHealthReporter::new()))
}

/// Runs the bridge over stdin and stdout with the supplied collaborators.
///
/// The bridge serves the subscription built-ins over a [`LocalClient`]; no
/// remote connection is configured.
#[must_use]
pub fn run_with(loader: &dyn ConfigLoader, reporter: Arc<dyn HealthReporter>) -> ExitCode {
    let Ok(startup) = bootstrap_with(loader, reporter) else {
        return ExitCode::FAILURE;
    };
    let reporter = startup.reporter();
    install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(source) => {
            reporter.input_failed(&ProcessError::Runtime { source });
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let (sink, receiver) = OutputSink::channel();
        let bridge = Bridge::new(
            Arc::new(LocalClient::new()),
            CommandRegistry::with_builtins(),
            EventRegistry::standard(),
            startup.settings(),
            sink,
        );
        let input = BufReader::new(tokio::io::stdin());
        serve(bridge, receiver, input, io::stdout(), reporter.as_ref()).await
    });

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            reporter.input_failed(&error);
            ExitCode::FAILURE
        }
    }
}

/// Serves `bridge` until `input` ends, writing envelopes to `output`.
///
/// The READY handshake is queued before the first line is read. On return
/// every envelope has been written and flushed. Returns the number of
/// command lines handled.
///
/// The writer only finishes once every [`OutputSink`] clone is gone. Sinks
/// captured by the remote client's listeners count, so callers must not keep
/// the client alive beyond the bridge.
///
/// # Errors
///
/// Returns a [`ProcessError`] when reading or writing fails.
pub async fn serve<C, R, W>(
    bridge: Bridge<C>,
    receiver: OutputReceiver,
    input: R,
    output: W,
    reporter: &dyn HealthReporter,
) -> Result<u64, ProcessError>
where
    C: RemoteClient,
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let writer = receiver.spawn_writer(output);
    bridge.ready();
    reporter.bridge_ready(bridge.settings());

    let outcome = run_bridge(&bridge, input).await;
    // The writer stops once the last sink is gone, and the bridge owns them.
    drop(bridge);
    let written = join_writer(writer).await?;
    debug!(target: PROCESS_TARGET, written, "output drained");

    let commands = outcome?;
    reporter.input_closed(commands);
    Ok(commands)
}

/// Feeds each non-blank line of `input` to `bridge` and waits for every
/// command it started.
///
/// Lines longer than the bridge's message limit are discarded unread, and
/// lines that are not UTF-8 are refused; each gets one `INVALID_PAYLOAD`
/// envelope with a `null` nonce and the stream carries on. A read failure is
/// reported to the host as an `ERROR` envelope with a `null` nonce before
/// being returned.
///
/// # Errors
///
/// Returns [`ProcessError::Input`] when reading fails.
pub async fn run_bridge<C, R>(bridge: &Bridge<C>, input: R) -> Result<u64, ProcessError>
where
    C: RemoteClient,
    R: AsyncBufRead + Unpin,
{
    let mut lines = LineReader::new(input, bridge.settings().max_message_bytes);
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    let mut commands = 0_u64;

    let result = loop {
        match lines.next_line().await {
            Ok(Some(InputLine::Text(line))) => {
                if line.trim().is_empty() {
                    continue;
                }
                commands += 1;
                in_flight.retain(|handle| !handle.is_finished());
                in_flight.push(bridge.handle(line));
            }
            Ok(Some(InputLine::Rejected(error))) => {
                commands += 1;
                bridge.reject(error);
            }
            Ok(None) => break Ok(commands),
            Err(source) => {
                bridge.report_failure(HandledError::unknown(format!(
                    "failed to read input: {source}"
                )));
                break Err(ProcessError::Input { source });
            }
        }
    };

    for handle in in_flight {
        if let Err(error) = handle.await {
            warn!(target: PROCESS_TARGET, %error, "command task failed");
        }
    }
    result
}

async fn join_writer(
    writer: JoinHandle<Result<u64, OutputError>>,
) -> Result<u64, ProcessError> {
    match tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, writer).await {
        Ok(Ok(Ok(written))) => Ok(written),
        Ok(Ok(Err(source))) => Err(ProcessError::Output { source }),
        Ok(Err(source)) => Err(ProcessError::Writer { source }),
        Err(_) => Err(ProcessError::WriterTimeout {
            timeout: WRITER_SHUTDOWN_TIMEOUT,
        }),
    }
}

/// Routes panic reports to the structured log instead of raw stderr text.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        error!(target: PROCESS_TARGET, panic = %info, "panic");
    }));
}
