//! End-to-end scenarios against a real, migrated Postgres database and
//! in-memory fake brokers, mirroring the literal scenarios enumerated in
//! the coordinator's design notes (§8).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Extension;
use axum::response::IntoResponse;
use axum::Json;
use sqlx::PgPool;

use queue_coordinator::balancer::LoadBalancer;
use queue_coordinator::broker::test_support::FakeBroker;
use queue_coordinator::broker::{Broker, BrokerRpc};
use queue_coordinator::context::AppContext;
use queue_coordinator::failover::FailoverManager;
use queue_coordinator::handlers::{self, PushRequestBody};
use queue_coordinator::placement::{Placement, PlacementStore};

fn broker(name: &str, latency_ms: u64) -> (Arc<FakeBroker>, Arc<Broker>) {
    let fake = Arc::new(FakeBroker::new(name).with_latency(Duration::from_millis(latency_ms)));
    let handle = Arc::new(Broker::new(
        Arc::clone(&fake) as Arc<dyn BrokerRpc>,
        format!("http://{name}"),
    ));
    handle.set_healthy(true);
    handle.record_latency(Duration::from_millis(latency_ms));
    (fake, handle)
}

fn context(store: PlacementStore, handles: Vec<Arc<Broker>>, replica: usize) -> AppContext {
    let broker_map: HashMap<_, _> = handles
        .iter()
        .map(|b| (b.name().to_string(), Arc::clone(b)))
        .collect();
    let placement = Arc::new(Placement::new(broker_map, store.clone(), replica));
    AppContext::new(store, placement, handles)
}

#[sqlx::test(migrations = "./migrations")]
async fn scenario_1_push_assigns_fastest_as_master(pool: PgPool) -> sqlx::Result<()> {
    let store = PlacementStore::new(pool);
    let (fast, fast_h) = broker("fast", 10);
    let (mid, mid_h) = broker("mid", 20);
    let (slow, slow_h) = broker("slow", 30);
    let ctx = context(store.clone(), vec![fast_h, mid_h, slow_h], 3);

    let resp = handlers::push(
        Extension(ctx),
        Json(PushRequestBody {
            key: "a".into(),
            value: vec![0x01],
        }),
    )
    .await
    .unwrap()
    .into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::OK);

    assert_eq!(store.master_of("a").await?, Some("fast".to_string()));
    let mut replicas = store.replicas_of("a").await?;
    replicas.sort();
    assert_eq!(replicas, vec!["mid".to_string(), "slow".to_string()]);

    for b in [&fast, &mid, &slow] {
        assert_eq!(b.queue_contents("a"), vec![vec![0x01]]);
        assert_eq!(b.call_count("push"), 1);
    }

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn scenario_2_pop_drains_and_erases_everywhere(pool: PgPool) -> sqlx::Result<()> {
    let store = PlacementStore::new(pool);
    let (fast, fast_h) = broker("fast", 10);
    let (mid, mid_h) = broker("mid", 20);
    let (slow, slow_h) = broker("slow", 30);
    let ctx = context(store.clone(), vec![fast_h, mid_h, slow_h], 3);

    handlers::push(
        Extension(ctx.clone()),
        Json(PushRequestBody {
            key: "a".into(),
            value: vec![0x01],
        }),
    )
    .await
    .unwrap();

    let resp = handlers::pop(Extension(ctx)).await.unwrap().into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::OK);

    for b in [&fast, &mid, &slow] {
        assert_eq!(b.call_count("remove"), 1);
        assert!(b.queue_contents("a").is_empty());
    }

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn scenario_3_failover_promotes_survivor_after_repeated_pushes(pool: PgPool) -> sqlx::Result<()> {
    let store = PlacementStore::new(pool);
    let (master, master_h) = broker("master", 5);
    let (survivor, survivor_h) = broker("survivor", 10);
    let ctx = context(store.clone(), vec![master_h.clone(), survivor_h.clone()], 2);

    for _ in 0..10 {
        handlers::push(
            Extension(ctx.clone()),
            Json(PushRequestBody {
                key: "x".into(),
                value: vec![0xDE, 0xAD],
            }),
        )
        .await
        .unwrap();
    }
    assert_eq!(master.queue_contents("x").len(), 10);
    assert_eq!(survivor.queue_contents("x").len(), 10);

    master.set_healthy(false);
    let mut brokers = HashMap::new();
    brokers.insert(master_h.name().to_string(), master_h.clone());
    brokers.insert(survivor_h.name().to_string(), survivor_h.clone());
    let failover = FailoverManager::new(brokers, store.clone());
    failover.handle_broker_down("master").await.unwrap();

    assert_eq!(store.all_of("x").await?, vec!["survivor".to_string()]);
    assert_eq!(store.master_of("x").await?, Some("survivor".to_string()));

    let pop_resp = handlers::pop(Extension(ctx)).await.unwrap().into_response();
    assert_eq!(pop_resp.status(), axum::http::StatusCode::OK);
    assert_eq!(survivor.call_count("remove"), 1);

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn scenario_4_load_balancer_migrates_one_key_when_gap_exceeds_scale_factor(
    pool: PgPool,
) -> sqlx::Result<()> {
    let store = PlacementStore::new(pool);
    let (fast_fake, fast_h) = broker("fast", 5);
    let (slow_fake, slow_h) = broker("slow", 60);

    slow_fake.add_key("k", false).await.unwrap();
    slow_fake.push("k", b"payload").await.unwrap();
    store.insert("k", "slow", false).await?;

    let mut brokers = HashMap::new();
    brokers.insert(fast_h.name().to_string(), fast_h.clone());
    brokers.insert(slow_h.name().to_string(), slow_h.clone());

    let balancer = LoadBalancer::new(brokers, store.clone(), Duration::from_secs(60), 4);
    balancer.tick_for_test().await.unwrap();

    assert_eq!(store.all_of("k").await?, vec!["fast".to_string()]);
    assert_eq!(fast_fake.call_count("import"), 1);
    assert_eq!(slow_fake.call_count("export"), 1);

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn scenario_5_push_fails_partway_surfaces_500_without_rollback(pool: PgPool) -> sqlx::Result<()> {
    let store = PlacementStore::new(pool);
    let (ok_broker, ok_h) = broker("ok", 10);
    let (bad_broker, bad_h) = broker("bad", 20);
    bad_broker.fail_add_key(true);
    let ctx = context(store.clone(), vec![ok_h, bad_h], 2);

    let result = handlers::push(
        Extension(ctx),
        Json(PushRequestBody {
            key: "p".into(),
            value: vec![0x09],
        }),
    )
    .await;

    assert!(result.is_err());
    let resp = result.unwrap_err().into_response();
    assert_eq!(resp.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

    // The broker that succeeded its AddKey is not unwound: `ok` is tried
    // first (it's the faster of the two) and its upstream queue creation
    // must have gone through even though the second broker's AddKey later
    // aborted the request.
    assert!(ok_broker.has_key("p"));
    assert_eq!(ok_broker.call_count("add_key"), 1);

    Ok(())
}
