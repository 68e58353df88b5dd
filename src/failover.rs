use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::broker::Broker;
use crate::placement::PlacementStore;

#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    #[error("failover for broker {broker} left one or more keys with no replica to promote")]
    IncompleteFailover { broker: String },
    #[error("placement store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Consumes a broker-down transition from `HealthMonitor`: for every key the
/// dead broker mastered, promotes one surviving replica to master, then
/// prunes the dead broker's placement rows.
pub struct FailoverManager {
    brokers: HashMap<String, Arc<Broker>>,
    store: PlacementStore,
}

impl FailoverManager {
    pub fn new(brokers: HashMap<String, Arc<Broker>>, store: PlacementStore) -> Self {
        Self { brokers, store }
    }

    /// Returns `Err` if any key could not be fully promoted (no surviving
    /// replica existed). On `Err`, `DropBroker` is *not* called — the dead
    /// broker's residual rows for the keys that succeeded still get
    /// cleaned up on a later retry once every key is resolved, keeping a
    /// partially-failed run retry-safe rather than leaving some rows
    /// referencing a broker that no keys still depend on.
    pub async fn handle_broker_down(&self, dead_broker: &str) -> Result<(), FailoverError> {
        let keys = self.store.master_keys_on(dead_broker).await?;
        let mut incomplete = false;

        for key in keys {
            let replicas = self.store.replicas_of(&key).await?;
            let Some(replica_name) = replicas.into_iter().next() else {
                warn!(key, broker = dead_broker, "no replica available for failover");
                incomplete = true;
                continue;
            };

            self.store.promote(&key, &replica_name).await?;

            match self.brokers.get(&replica_name) {
                Some(replica) => {
                    if let Err(err) = replica.rpc().set_master(&key, true).await {
                        warn!(
                            key,
                            replica = replica_name,
                            %err,
                            "promoted in the placement store but the upstream SetMaster call \
                             failed; broker state will diverge until the next retry"
                        );
                    } else {
                        info!(key, replica = replica_name, "promoted replica to master");
                    }
                }
                None => {
                    warn!(replica = replica_name, "promoted replica is not a known broker");
                }
            }
        }

        if incomplete {
            return Err(FailoverError::IncompleteFailover {
                broker: dead_broker.to_string(),
            });
        }

        self.store.drop_broker(dead_broker).await?;
        info!(broker = dead_broker, "dropped all placement rows for failed broker");
        Ok(())
    }
}
