use axum::routing::{get, post};
use axum::Router;

use crate::handlers;

pub fn routes(health_check_path: &str) -> Router {
    Router::new()
        .route("/push", post(handlers::push))
        .route("/pop", post(handlers::pop))
        .route(health_check_path, get(handlers::health_check))
}
