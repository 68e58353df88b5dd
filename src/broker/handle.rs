use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::client::BrokerRpc;

/// One configured cluster member, for the lifetime of the process.
///
/// `health` and `latency` are the only fields mutated after construction;
/// they are written by exactly one `HealthMonitor` task per broker and read
/// by everyone else (`Placement`, `LoadBalancer`, the request handlers), so
/// they are plain atomics rather than anything requiring a lock to read.
pub struct Broker {
    name: String,
    address: String,
    health: AtomicBool,
    /// Smoothed round-trip latency in microseconds. `u64::MAX` stands in
    /// for "never probed" so an unprobed broker always loses latency
    /// comparisons (see Placement's K-smallest-latency selection).
    latency_micros: AtomicU64,
    rpc: Arc<dyn BrokerRpc>,
    /// Held by the load balancer across an Export+Import migration pair, in
    /// addition to (not instead of) each individual RPC's own per-call
    /// lock. Source-then-target acquisition order is fixed by the caller
    /// to avoid deadlock when both of a migration's brokers must be held
    /// at once.
    migration_lock: Mutex<()>,
}

pub const UNKNOWN_LATENCY: Duration = Duration::from_micros(u64::MAX);

impl Broker {
    pub fn new(rpc: Arc<dyn BrokerRpc>, address: impl Into<String>) -> Self {
        let name = rpc.name().to_string();
        Self {
            name,
            address: address.into(),
            health: AtomicBool::new(false),
            latency_micros: AtomicU64::new(u64::MAX),
            rpc,
            migration_lock: Mutex::new(()),
        }
    }

    pub fn migration_lock(&self) -> &Mutex<()> {
        &self.migration_lock
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn rpc(&self) -> &Arc<dyn BrokerRpc> {
        &self.rpc
    }

    pub fn is_healthy(&self) -> bool {
        self.health.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.health.store(healthy, Ordering::Release);
    }

    /// `UNKNOWN_LATENCY` if this broker has never been successfully probed.
    pub fn latency(&self) -> Duration {
        let micros = self.latency_micros.load(Ordering::Acquire);
        if micros == u64::MAX {
            UNKNOWN_LATENCY
        } else {
            Duration::from_micros(micros)
        }
    }

    pub fn record_latency(&self, latency: Duration) {
        let micros = latency.as_micros().min(u128::from(u64::MAX - 1)) as u64;
        self.latency_micros.store(micros, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::test_support::FakeBroker;

    #[test]
    fn fresh_broker_is_unhealthy_with_unknown_latency() {
        let broker = Broker::new(Arc::new(FakeBroker::new("b1")), "http://b1");
        assert!(!broker.is_healthy());
        assert_eq!(broker.latency(), UNKNOWN_LATENCY);
    }

    #[test]
    fn health_and_latency_round_trip() {
        let broker = Broker::new(Arc::new(FakeBroker::new("b1")), "http://b1");
        broker.set_healthy(true);
        broker.record_latency(Duration::from_millis(12));
        assert!(broker.is_healthy());
        assert_eq!(broker.latency(), Duration::from_millis(12));
    }
}
