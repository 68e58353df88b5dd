use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::info;

use crate::balancer::LoadBalancer;
use crate::broker::{Broker, BrokerClient};
use crate::config::Settings;
use crate::context::AppContext;
use crate::failover::FailoverManager;
use crate::health::HealthMonitor;
use crate::placement::{Placement, PlacementStore};

/// Owns every component's lifetime: the broker table (registered once from
/// configuration and never changed afterward), the placement policy and
/// store, and the background health-monitor/load-balancer tasks.
pub struct Coordinator {
    ctx: AppContext,
    brokers: Vec<Arc<Broker>>,
    settings: Settings,
    shutdown_tx: watch::Sender<bool>,
}

impl Coordinator {
    pub fn new(settings: Settings, pool: PgPool) -> Self {
        let brokers: Vec<Arc<Broker>> = settings
            .brokers
            .iter()
            .map(|cfg| {
                let rpc = Arc::new(BrokerClient::new(cfg.name.clone(), cfg.address.clone()));
                Arc::new(Broker::new(rpc, cfg.address.clone()))
            })
            .collect();

        let store = PlacementStore::new(pool);
        let broker_map = broker_map(&brokers);
        let placement = Arc::new(Placement::new(broker_map, store.clone(), settings.replica));
        let ctx = AppContext::new(store, placement, brokers.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            ctx,
            brokers,
            settings,
            shutdown_tx,
        }
    }

    pub fn context(&self) -> AppContext {
        self.ctx.clone()
    }

    /// Starts one health-monitor task per broker and one load-balancer
    /// task, all observing the coordinator's shutdown signal.
    pub fn spawn_background_loops(&self) {
        let broker_map = broker_map(&self.brokers);
        let failover = Arc::new(FailoverManager::new(broker_map.clone(), self.ctx.store().clone()));

        for broker in &self.brokers {
            let monitor = HealthMonitor::new(
                Arc::clone(broker),
                Arc::clone(&failover),
                self.settings.broker_health_check_interval,
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move { monitor.run(shutdown_rx).await });
        }

        let balancer = LoadBalancer::new(
            broker_map,
            self.ctx.store().clone(),
            self.settings.auto_scaling_interval,
            self.settings.scale_factor,
        );
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move { balancer.run(shutdown_rx).await });

        info!(brokers = self.brokers.len(), "background loops started");
    }

    /// Signals every background loop, and anyone holding a receiver from
    /// `shutdown_receiver`, to stop. In-flight RPCs complete or time out
    /// naturally (§5).
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawns a task that calls `shutdown` once ctrl-c or SIGTERM arrives,
    /// so the HTTP server (which also watches `shutdown_receiver`) and the
    /// background loops stop together from one OS signal.
    pub fn spawn_shutdown_listener(&self) {
        let tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            crate::shutdown::signal().await;
            let _ = tx.send(true);
        });
    }
}

fn broker_map(brokers: &[Arc<Broker>]) -> HashMap<String, Arc<Broker>> {
    brokers
        .iter()
        .map(|b| (b.name().to_string(), Arc::clone(b)))
        .collect()
}
