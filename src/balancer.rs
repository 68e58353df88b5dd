use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::placement::PlacementStore;

/// Periodic rebalancer: each tick migrates at most one key from the
/// slowest healthy broker to the fastest, when the slow broker is enough
/// slower than the fast one to be worth the move.
pub struct LoadBalancer {
    brokers: HashMap<String, Arc<Broker>>,
    store: PlacementStore,
    interval: Duration,
    scale_factor: u32,
}

impl LoadBalancer {
    pub fn new(
        brokers: HashMap<String, Arc<Broker>>,
        store: PlacementStore,
        interval: Duration,
        scale_factor: u32,
    ) -> Self {
        Self {
            brokers,
            store,
            interval,
            scale_factor,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        warn!(%err, "load balancer tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("load balancer stopping");
                        return;
                    }
                }
            }
        }
    }

    fn fastest_and_slowest(&self) -> Option<(Arc<Broker>, Arc<Broker>)> {
        let mut healthy: Vec<&Arc<Broker>> = self.brokers.values().filter(|b| b.is_healthy()).collect();
        healthy.sort_by_key(|b| b.latency());

        let fast = healthy.first()?;
        let slow = healthy.last()?;
        Some((Arc::clone(fast), Arc::clone(slow)))
    }

    /// Exposes a single tick to integration tests, which cannot wait out a
    /// real interval timer and have no other way to reach a private method.
    #[cfg(any(test, feature = "testing"))]
    pub async fn tick_for_test(&self) -> Result<(), sqlx::Error> {
        self.tick().await
    }

    async fn tick(&self) -> Result<(), sqlx::Error> {
        let Some((fast, slow)) = self.fastest_and_slowest() else {
            debug!("fewer than two healthy brokers, skipping rebalance tick");
            return Ok(());
        };

        if fast.name() == slow.name() {
            debug!("only one healthy broker, skipping rebalance tick");
            return Ok(());
        }

        if fast.latency().saturating_mul(self.scale_factor) > slow.latency() {
            debug!(
                fast = fast.name(),
                slow = slow.name(),
                "latency gap below scale factor, skipping"
            );
            return Ok(());
        }

        let candidate_keys = self.store.keys_on_excluding(slow.name(), fast.name()).await?;
        let Some(key) = candidate_keys.into_iter().next() else {
            debug!(
                slow = slow.name(),
                fast = fast.name(),
                "no migratable key: every key on the slow broker is already on the fast one"
            );
            return Ok(());
        };

        self.migrate(&key, &slow, &fast).await
    }

    /// Locks `slow` (the source) then `fast` (the target), in that fixed
    /// order, so concurrent migrations can never deadlock against each
    /// other over the same pair of brokers.
    async fn migrate(&self, key: &str, slow: &Arc<Broker>, fast: &Arc<Broker>) -> Result<(), sqlx::Error> {
        let _source_guard = slow.migration_lock().lock().await;
        let _target_guard = fast.migration_lock().lock().await;

        let is_master = self
            .store
            .master_of(key)
            .await?
            .map(|master| master == slow.name())
            .unwrap_or(false);

        let values = match slow.rpc().export(key).await {
            Ok(values) => values,
            Err(err) => {
                warn!(key, broker = slow.name(), %err, "export failed, aborting migration");
                return Ok(());
            }
        };

        if let Err(err) = fast.rpc().import(key, is_master, &values).await {
            warn!(key, broker = fast.name(), %err, "import failed, aborting migration");
            return Ok(());
        }

        self.store.reassign(key, slow.name(), fast.name()).await?;
        info!(key, from = slow.name(), to = fast.name(), "migrated key");
        Ok(())
    }
}
