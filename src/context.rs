use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::Broker;
use crate::placement::{Placement, PlacementStore};

/// Shared state handed to every axum handler via an `Extension`. Cloning is
/// cheap — everything inside is reference-counted or itself a connection
/// pool handle.
#[derive(Clone)]
pub struct AppContext {
    store: PlacementStore,
    placement: Arc<Placement>,
    /// Brokers in the fixed order they were registered from configuration.
    /// Pop walks brokers in this order, which is what the spec calls
    /// "iteration order" — deterministic here, even though the spec treats
    /// it as an implementation detail callers must not rely on.
    broker_order: Arc<Vec<Arc<Broker>>>,
    brokers_by_name: Arc<HashMap<String, Arc<Broker>>>,
}

impl AppContext {
    pub fn new(
        store: PlacementStore,
        placement: Arc<Placement>,
        broker_order: Vec<Arc<Broker>>,
    ) -> Self {
        let brokers_by_name = broker_order
            .iter()
            .map(|b| (b.name().to_string(), Arc::clone(b)))
            .collect();

        Self {
            store,
            placement,
            broker_order: Arc::new(broker_order),
            brokers_by_name: Arc::new(brokers_by_name),
        }
    }

    pub fn store(&self) -> &PlacementStore {
        &self.store
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn broker_order(&self) -> &[Arc<Broker>] {
        &self.broker_order
    }

    pub fn broker(&self, name: &str) -> Option<&Arc<Broker>> {
        self.brokers_by_name.get(name)
    }
}
