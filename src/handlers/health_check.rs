use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::context::AppContext;

use super::wire::OkMessage;

/// `GET <health_check_path>` — 200 iff the placement store answers a
/// trivial query, 503 otherwise. This is a liveness check for the
/// coordinator process itself, distinct from the per-broker `Healthz` RPCs
/// `HealthMonitor` issues.
pub async fn health_check(Extension(ctx): Extension<AppContext>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(ctx.store().pool()).await {
        Ok(_) => (StatusCode::OK, Json(OkMessage::ok())).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "placement store unreachable" })),
        )
            .into_response(),
    }
}
