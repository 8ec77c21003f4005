//! Shared doubles and harnesses for the bridge test suites.

mod bridge;
mod config_loader;
mod reporter;

pub use bridge::{BridgeWorld, SharedBuffer, test_bridge};
pub use config_loader::{FailingConfigLoader, InvalidConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
