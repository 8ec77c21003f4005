//! Lifecycle reporting for the bridge process.

use std::sync::Arc;

use switchyard_config::Config;

use crate::bootstrap::BootstrapError;
use crate::bridge::BridgeSettings;
use crate::process::ProcessError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for process lifecycle milestones.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked once configuration and telemetry are ready.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after the READY handshake has been queued.
    fn bridge_ready(&self, settings: &BridgeSettings);

    /// Invoked when the input stream ends and in-flight commands have
    /// finished.
    fn input_closed(&self, commands: u64);

    /// Invoked when the input or output stream fails.
    fn input_failed(&self, error: &ProcessError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn bridge_ready(&self, settings: &BridgeSettings) {
        (**self).bridge_ready(settings);
    }

    fn input_closed(&self, commands: u64) {
        (**self).input_closed(commands);
    }

    fn input_failed(&self, error: &ProcessError) {
        (**self).input_failed(error);
    }
}

/// Reporter that records lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting bridge bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "bridge bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "bridge bootstrap failed"
        );
    }

    fn bridge_ready(&self, settings: &BridgeSettings) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bridge_ready",
            dedup_window = ?settings.dedup_window,
            dedup_capacity = settings.dedup_capacity.get(),
            max_message_bytes = settings.max_message_bytes,
            "bridge accepting commands"
        );
    }

    fn input_closed(&self, commands: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "input_closed",
            commands,
            "input closed; bridge shutting down"
        );
    }

    fn input_failed(&self, error: &ProcessError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "input_failed",
            error = %error,
            "bridge stream failed"
        );
    }
}
