use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use crate::context::AppContext;
use crate::error::AppError;

use super::wire::{OkMessage, PushRequestBody};

/// `POST /push` — assigns the key on first sight, then fans the push out to
/// every broker in `AllOf(key)` in order. The first upstream failure stops
/// the fan-out and fails the request; brokers that already accepted the
/// push are not rolled back (§4.7, §9).
pub async fn push(
    Extension(ctx): Extension<AppContext>,
    Json(body): Json<PushRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    if body.key.is_empty() {
        return Err(AppError::BadRequest("key must not be empty".into()));
    }
    if body.value.is_empty() {
        return Err(AppError::BadRequest("value must not be empty".into()));
    }

    if ctx.store().master_of(&body.key).await?.is_none() {
        ctx.placement().assign_key(&body.key).await?;
    }

    let targets = ctx.store().all_of(&body.key).await?;
    for target_name in targets {
        let broker = ctx.broker(&target_name).ok_or_else(|| {
            AppError::Invariant(format!(
                "placement row for {} references unknown broker {target_name}",
                body.key
            ))
        })?;
        broker.rpc().push(&body.key, &body.value).await?;
    }

    info!(key = %body.key, "push complete");
    Ok((StatusCode::OK, Json(OkMessage::ok())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::broker::{test_support::FakeBroker, Broker};
    use crate::placement::Placement;

    use super::*;

    async fn test_pool() -> sqlx::PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/placeholder")
            .expect("lazy pool construction does not touch the network")
    }

    fn healthy_broker(name: &str, latency_ms: u64) -> Arc<Broker> {
        let fake = Arc::new(FakeBroker::new(name).with_latency(Duration::from_millis(latency_ms)));
        let b = Arc::new(Broker::new(fake, format!("http://{name}")));
        b.set_healthy(true);
        b.record_latency(Duration::from_millis(latency_ms));
        b
    }

    #[tokio::test]
    async fn rejects_empty_key_and_value() {
        let pool = test_pool().await;
        let store = crate::placement::PlacementStore::new(pool);
        let brokers = vec![healthy_broker("b1", 5)];
        let placement = Arc::new(Placement::new(
            brokers.iter().map(|b| (b.name().to_string(), Arc::clone(b))).collect(),
            store.clone(),
            1,
        ));
        let ctx = AppContext::new(store, placement, brokers);

        let err = push(
            Extension(ctx.clone()),
            Json(PushRequestBody {
                key: String::new(),
                value: vec![1],
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = push(
            Extension(ctx),
            Json(PushRequestBody {
                key: "k".into(),
                value: vec![],
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn push_to_fresh_key_with_zero_healthy_brokers_fails() {
        let pool = test_pool().await;
        let store = crate::placement::PlacementStore::new(pool);
        let fake = Arc::new(FakeBroker::new("b1"));
        let broker = Arc::new(Broker::new(fake, "http://b1"));
        broker.set_healthy(false);

        let placement = Arc::new(Placement::new(
            [(broker.name().to_string(), Arc::clone(&broker))].into(),
            store.clone(),
            1,
        ));
        let ctx = AppContext::new(store, placement, vec![broker]);

        let err = push(
            Extension(ctx),
            Json(PushRequestBody {
                key: "fresh".into(),
                value: vec![1],
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Assign(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
