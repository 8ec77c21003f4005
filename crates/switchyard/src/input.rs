//! Bounded line reading for the command stream.
//!
//! A line is buffered only up to the configured message limit. Past that the
//! rest of the line is consumed and dropped, so a host that never sends a
//! newline costs at most `max_bytes` of memory.

use std::io;
use std::mem;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::dispatch::DispatchError;

/// One line taken from the input stream.
#[derive(Debug)]
pub enum InputLine {
    /// A line of text without its terminator.
    Text(String),
    /// A line refused before dispatch, answered with a `null` nonce.
    Rejected(DispatchError),
}

/// Splits an async byte stream into size-bounded lines.
#[derive(Debug)]
pub struct LineReader<R> {
    input: R,
    max_bytes: usize,
    buffer: Vec<u8>,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Reads lines from `input`, refusing any longer than `max_bytes`.
    pub const fn new(input: R, max_bytes: usize) -> Self {
        Self {
            input,
            max_bytes,
            buffer: Vec::new(),
        }
    }

    /// Returns the next line, or `None` at end of input.
    ///
    /// The final line does not need a trailing newline. A line that is not
    /// UTF-8 or exceeds the limit comes back as [`InputLine::Rejected`] and
    /// reading can continue with the following line.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the stream itself fails.
    pub async fn next_line(&mut self) -> io::Result<Option<InputLine>> {
        self.buffer.clear();
        let mut size = 0_usize;
        let mut read_any = false;

        loop {
            let chunk = self.input.fill_buf().await?;
            if chunk.is_empty() {
                if !read_any {
                    return Ok(None);
                }
                break;
            }
            read_any = true;

            let newline = chunk.iter().position(|byte| *byte == b'\n');
            let (content, consumed) = match newline {
                Some(position) => (chunk.split_at(position).0, position + 1),
                None => (chunk, chunk.len()),
            };
            size = size.saturating_add(content.len());
            if size <= self.max_bytes {
                self.buffer.extend_from_slice(content);
            } else if !self.buffer.is_empty() {
                self.buffer = Vec::new();
            }
            self.input.consume(consumed);

            if newline.is_some() {
                break;
            }
        }

        if size > self.max_bytes {
            return Ok(Some(InputLine::Rejected(DispatchError::payload_too_large(
                size,
                self.max_bytes,
            ))));
        }
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        match String::from_utf8(mem::take(&mut self.buffer)) {
            Ok(line) => Ok(Some(InputLine::Text(line))),
            Err(_) => Ok(Some(InputLine::Rejected(DispatchError::malformed(
                "input line is not valid UTF-8",
            )))),
        }
    }
}
