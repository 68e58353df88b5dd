mod client;
mod handle;
mod types;

#[cfg(any(test, feature = "testing"))]
pub mod test_support;

pub use client::{BrokerClient, BrokerError, BrokerRpc};
pub use handle::{Broker, UNKNOWN_LATENCY};
pub use types::Element;
