//! Layered configuration for the Switchyard bridge.
//!
//! Values are merged from defaults, an optional configuration file, the
//! `SWITCHYARD_*` environment and command-line flags, in increasing order of
//! precedence. Loading is delegated to [`ortho_config`]; this crate only
//! declares the fields and their defaults.

mod defaults;
mod logging;

use std::num::NonZeroUsize;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_WINDOW_MS, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_MESSAGE_BYTES, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHYARD")]
pub struct Config {
    /// `tracing` filter expression applied to diagnostic logs.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Diagnostic log format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Window within which a repeated dedup key is suppressed.
    #[ortho_config(default = DEFAULT_DEDUP_WINDOW_MS)]
    pub dedup_window_ms: u64,
    /// Maximum number of dedup keys remembered at once.
    #[ortho_config(default = DEFAULT_DEDUP_CAPACITY)]
    pub dedup_capacity: usize,
    /// Largest inbound message accepted, in bytes.
    #[ortho_config(default = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Semantic problems found in an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The dedup gate needs room for at least one key.
    #[error("dedup_capacity must be greater than zero")]
    ZeroDedupCapacity,
    /// A zero-byte limit would reject every message.
    #[error("max_message_bytes must be greater than zero")]
    ZeroMessageLimit,
}

impl Config {
    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Dedup window as a [`Duration`].
    #[must_use]
    pub const fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    /// Dedup capacity, validated to be non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroDedupCapacity`] when the capacity is zero.
    pub fn dedup_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.dedup_capacity).ok_or(ConfigError::ZeroDedupCapacity)
    }

    /// Maximum inbound message size.
    #[must_use]
    pub const fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    /// Checks invariants that the loader cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dedup_capacity()?;
        if self.max_message_bytes == 0 {
            return Err(ConfigError::ZeroMessageLimit);
        }
        Ok(())
    }
}
