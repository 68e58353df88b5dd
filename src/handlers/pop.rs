use axum::extract::Extension;
use axum::response::IntoResponse;
use axum::Json;
use tracing::warn;

use crate::context::AppContext;
use crate::error::AppError;

use super::wire::PopResponseBody;

/// `POST /pop` — drains whichever healthy broker is queried first that has
/// a non-empty master queue. Pop is non-deterministic across keys: FIFO
/// order is only guaranteed within a single key on a single broker (§4.8).
pub async fn pop(Extension(ctx): Extension<AppContext>) -> Result<impl IntoResponse, AppError> {
    for broker in ctx.broker_order().iter().filter(|b| b.is_healthy()) {
        let element = match broker.rpc().front().await {
            Ok(element) => element,
            Err(err) => {
                warn!(broker = broker.name(), %err, "front check failed, trying next broker");
                continue;
            }
        };

        if !element.is_empty() {
            erase(&ctx, &element.key).await;
            return Ok(Json(PopResponseBody::found(element.key, element.value)));
        }
    }

    Ok(Json(PopResponseBody::empty()))
}

/// Removes `key`'s front element from every broker in `AllOf(key)`.
/// Individual broker failures — and a failure to even read the placement
/// row set — are logged and otherwise ignored: the element has already
/// been handed to the client, so the response cannot be un-sent.
async fn erase(ctx: &AppContext, key: &str) {
    let targets = match ctx.store().all_of(key).await {
        Ok(targets) => targets,
        Err(err) => {
            warn!(key, %err, "could not look up placements to erase popped key");
            return;
        }
    };

    for name in targets {
        let Some(broker) = ctx.broker(&name) else {
            warn!(key, broker = name, "erase target is not a known broker");
            continue;
        };

        if let Err(err) = broker.rpc().remove(key).await {
            warn!(key, broker = name, %err, "remove failed during erase");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::broker::{test_support::FakeBroker, Broker};
    use crate::placement::{Placement, PlacementStore};

    use super::*;

    async fn test_pool() -> sqlx::PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/placeholder")
            .expect("lazy pool construction does not touch the network")
    }

    #[tokio::test]
    async fn empty_when_every_broker_has_nothing() {
        let pool = test_pool().await;
        let store = PlacementStore::new(pool);
        let fake = Arc::new(FakeBroker::new("b1").with_latency(Duration::from_millis(5)));
        let broker = Arc::new(Broker::new(fake, "http://b1"));
        broker.set_healthy(true);

        let placement = Arc::new(Placement::new(
            [(broker.name().to_string(), Arc::clone(&broker))].into(),
            store.clone(),
            1,
        ));
        let ctx = AppContext::new(store, placement, vec![broker]);

        let resp = pop(Extension(ctx)).await.unwrap().into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn unhealthy_brokers_are_skipped() {
        let pool = test_pool().await;
        let store = PlacementStore::new(pool);
        let fake = Arc::new(FakeBroker::new("b1"));
        let broker = Arc::new(Broker::new(
            Arc::clone(&fake) as Arc<dyn crate::broker::BrokerRpc>,
            "http://b1",
        ));
        broker.set_healthy(false);

        let placement = Arc::new(Placement::new(
            [(broker.name().to_string(), Arc::clone(&broker))].into(),
            store.clone(),
            1,
        ));
        let ctx = AppContext::new(store, placement, vec![broker]);

        let _resp = pop(Extension(ctx)).await.unwrap();
        assert_eq!(fake.call_count("front"), 0);
    }
}
