//! The single line-oriented output stream.
//!
//! Command tasks, event fan-out and process-level error reporting all emit
//! [`Envelope`]s through a cloneable [`OutputSink`]. One writer drains the
//! channel and serialises each envelope as a JSON line, so concurrent
//! producers never interleave partial lines.

use std::io::{self, Write};

use switchyard_protocol::Envelope;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const OUTPUT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::output");

/// Errors raised while writing envelopes.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Writing or flushing the stream failed.
    #[error("failed to write envelope: {0}")]
    Io(#[from] io::Error),
    /// Serialising the envelope failed.
    #[error("failed to serialise envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Cloneable producer side of the output stream.
#[derive(Debug, Clone)]
pub struct OutputSink {
    sender: mpsc::UnboundedSender<Envelope>,
}

/// Consumer side of the output stream.
#[derive(Debug)]
pub struct OutputReceiver {
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl OutputSink {
    /// Creates a connected sink and receiver.
    #[must_use]
    pub fn channel() -> (Self, OutputReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, OutputReceiver { receiver })
    }

    /// Queues an envelope for writing.
    ///
    /// Envelopes emitted after the receiver has gone are dropped.
    pub fn emit(&self, envelope: Envelope) {
        if let Err(error) = self.sender.send(envelope) {
            debug!(
                target: OUTPUT_TARGET,
                cmd = %error.0.cmd,
                "output closed; dropping envelope"
            );
        }
    }
}

impl OutputReceiver {
    /// Waits for the next envelope, returning `None` once every sink is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Collects every envelope queued so far without waiting.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Ok(envelope) = self.receiver.try_recv() {
            envelopes.push(envelope);
        }
        envelopes
    }

    /// Writes envelopes to `writer` on a blocking thread until every sink has
    /// been dropped.
    pub fn spawn_writer<W>(self, writer: W) -> JoinHandle<Result<u64, OutputError>>
    where
        W: Write + Send + 'static,
    {
        let Self { mut receiver } = self;
        tokio::task::spawn_blocking(move || {
            let mut writer = ResponseWriter::new(writer);
            let mut written = 0_u64;
            while let Some(envelope) = receiver.blocking_recv() {
                writer.write_envelope(&envelope)?;
                written += 1;
            }
            Ok(written)
        })
    }
}

/// Serialises envelopes as JSON lines.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps an output stream.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one envelope followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation, writing or flushing fails.
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, envelope)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
