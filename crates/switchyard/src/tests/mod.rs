//! Behavioural and integration suites for the bridge.

mod process_behaviour;
mod support;
