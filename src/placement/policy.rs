use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::broker::Broker;

use super::store::PlacementStore;

/// Assignment policy for first-seen keys: choose up to `replication_factor`
/// brokers among the healthy ones, fastest first.
pub struct Placement {
    brokers: HashMap<String, Arc<Broker>>,
    store: PlacementStore,
    replication_factor: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    #[error("broker {broker} rejected AddKey for {key}: {source}")]
    Broker {
        broker: String,
        key: String,
        #[source]
        source: crate::broker::BrokerError,
    },
    #[error("placement store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("no healthy brokers available to assign key {key}")]
    NoHealthyBrokers { key: String },
}

impl Placement {
    pub fn new(
        brokers: HashMap<String, Arc<Broker>>,
        store: PlacementStore,
        replication_factor: usize,
    ) -> Self {
        assert!(replication_factor >= 1, "replication factor must be >= 1");
        Self {
            brokers,
            store,
            replication_factor,
        }
    }

    /// K-smallest-latency selection among healthy brokers: maintains a
    /// bounded list of size `r`, replacing its current-largest entry with a
    /// faster candidate as they're seen. An unprobed broker (latency
    /// `UNKNOWN_LATENCY`) is treated as "very large" so it never displaces
    /// an already-probed candidate — this resolves the ambiguity the
    /// original comparison left open for never-probed brokers.
    ///
    /// The first element of the result is the chosen master — always the
    /// genuinely fastest of the selected brokers, never just whatever order
    /// the candidate slice happened to arrive in. Ties are broken by the
    /// candidates' input order, which callers should treat as arbitrary (it
    /// reflects broker map iteration order upstream, not a deliberate
    /// ranking).
    pub fn select_k_fastest(candidates: &[(String, Duration)], r: usize) -> Vec<String> {
        let mut chosen: Vec<(String, Duration)> = Vec::with_capacity(r);

        for (name, latency) in candidates {
            if chosen.len() < r {
                chosen.push((name.clone(), *latency));
                continue;
            }

            if let Some((worst_idx, _)) = chosen
                .iter()
                .enumerate()
                .max_by_key(|(_, (_, latency))| *latency)
            {
                if *latency < chosen[worst_idx].1 {
                    chosen[worst_idx] = (name.clone(), *latency);
                }
            }
        }

        // The scan above only bounds the *set* of K smallest; it never
        // orders `chosen` itself, so without this sort index 0 would be
        // whatever candidate happened to land first in `candidates` rather
        // than the fastest one. Master selection (`assign_key` takes
        // `chosen[0]` as master) depends on this being a real ordering.
        chosen.sort_by_key(|(_, latency)| *latency);
        chosen.into_iter().map(|(name, _)| name).collect()
    }

    fn healthy_candidates(&self) -> Vec<(String, Duration)> {
        self.brokers
            .values()
            .filter(|b| b.is_healthy())
            .map(|b| (b.name().to_string(), b.latency()))
            .collect()
    }

    /// Chooses brokers for a first-seen `key`, calls `AddKey` on each in
    /// order, then inserts the placement rows. If fewer than
    /// `replication_factor` brokers are healthy (but at least one is),
    /// assignment proceeds with whatever count is available and the key
    /// ends up under-replicated — this is a known, intentionally preserved
    /// weakness, not a bug. Zero healthy brokers is not survivable: there
    /// is nowhere to put the key, so assignment fails outright rather than
    /// silently succeeding with an empty placement.
    ///
    /// If an `AddKey` call fails partway through, the brokers that already
    /// accepted it are not unwound; the error is simply surfaced so the
    /// caller (the Push handler) fails the request.
    pub async fn assign_key(&self, key: &str) -> Result<Vec<String>, AssignError> {
        let candidates = self.healthy_candidates();
        let chosen = Self::select_k_fastest(&candidates, self.replication_factor);

        if chosen.is_empty() {
            return Err(AssignError::NoHealthyBrokers {
                key: key.to_string(),
            });
        }

        if chosen.len() < self.replication_factor {
            warn!(
                key,
                healthy = chosen.len(),
                wanted = self.replication_factor,
                "assigning key with fewer healthy brokers than the replication factor"
            );
        }

        for (idx, name) in chosen.iter().enumerate() {
            let is_master = idx == 0;
            let broker = self
                .brokers
                .get(name)
                .expect("candidate name came from this policy's own broker table");

            broker
                .rpc()
                .add_key(key, is_master)
                .await
                .map_err(|source| AssignError::Broker {
                    broker: name.clone(),
                    key: key.to_string(),
                    source,
                })?;

            self.store.insert(key, name, is_master).await?;
        }

        info!(key, brokers = ?chosen, "assigned key");
        Ok(chosen)
    }
}
