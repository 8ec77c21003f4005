//! Host subscriptions to remote events.
//!
//! A subscription is identified by its event name together with its filter
//! arguments under [`structural_eq`]; the registry never holds two equal
//! entries. Filters are matched field by field against normalised event
//! payloads with [`matches`].

mod equality;
mod filter;
mod registry;

pub use equality::structural_eq;
pub use filter::matches;
pub use registry::{Dispatcher, Subscription, SubscriptionRegistry};

const SUBSCRIPTIONS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::subscriptions");
