use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::failover::FailoverManager;

/// One cooperative loop per broker, probing on `interval` and running the
/// UP/DOWN state machine described in the coordinator's design notes:
///
/// | prior | probe | new  | action                                        |
/// |-------|-------|------|-----------------------------------------------|
/// | up    | ok    | up   | none                                          |
/// | up    | fail  | down | trigger failover; health=false only on success|
/// | down  | fail  | down | none                                          |
/// | down  | ok    | up   | log recovery; health=true                     |
///
/// Gating the down transition on a successful failover means a failed
/// failover keeps the broker marked up, so the next tick retries rather
/// than the cluster losing its memory of which keys the broker owned. This
/// is a deliberate design choice, not a bug.
pub struct HealthMonitor {
    broker: Arc<Broker>,
    failover: Arc<FailoverManager>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(broker: Arc<Broker>, failover: Arc<FailoverManager>, interval: Duration) -> Self {
        Self {
            broker,
            failover,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(broker = self.broker.name(), "health monitor stopping");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        let probe = self.broker.rpc().healthz().await;
        let was_healthy = self.broker.is_healthy();

        match (was_healthy, probe) {
            (true, Ok(latency)) => {
                self.broker.record_latency(latency);
                debug!(broker = self.broker.name(), ?latency, "healthz ok");
            }
            (true, Err(err)) => {
                warn!(broker = self.broker.name(), %err, "broker went down, triggering failover");
                match self.failover.handle_broker_down(self.broker.name()).await {
                    Ok(()) => self.broker.set_healthy(false),
                    Err(err) => {
                        warn!(
                            broker = self.broker.name(),
                            %err,
                            "failover did not complete, keeping broker marked up for retry"
                        );
                    }
                }
            }
            (false, Err(_)) => {
                debug!(broker = self.broker.name(), "still down");
            }
            (false, Ok(latency)) => {
                info!(broker = self.broker.name(), "broker recovered");
                self.broker.record_latency(latency);
                self.broker.set_healthy(true);
            }
        }
    }
}
