//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use switchyard_config::Config;

use crate::bootstrap::BootstrapError;
use crate::bridge::BridgeSettings;
use crate::health::HealthReporter;
use crate::process::ProcessError;

/// Lifecycle events observed during a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed.
    BootstrapSucceeded,
    /// Bootstrap failed with the rendered error.
    BootstrapFailed(String),
    /// The READY handshake was queued.
    BridgeReady,
    /// Input ended after this many commands.
    InputClosed(u64),
    /// A stream failed with the rendered error.
    InputFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn bridge_ready(&self, _settings: &BridgeSettings) {
        self.record(HealthEvent::BridgeReady);
    }

    fn input_closed(&self, commands: u64) {
        self.record(HealthEvent::InputClosed(commands));
    }

    fn input_failed(&self, error: &ProcessError) {
        self.record(HealthEvent::InputFailed(error.to_string()));
    }
}
