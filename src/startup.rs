use std::net::TcpListener;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::PostgresSettings;
use crate::context::AppContext;
use crate::cors::cors_layer;
use crate::routes::routes;

pub async fn connect_to_postgres(settings: &PostgresSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(16)
        .connect(&settings.connection_string())
        .await?;

    Ok(pool)
}

/// Builds the northbound HTTP server. It stops as soon as `shutdown` is set
/// to `true` — the same signal the coordinator's background loops watch,
/// so one call to `Coordinator::shutdown` (or the listener it spawns for
/// ctrl-c/SIGTERM) stops the server and the loops together (§5's "clean-stop
/// signal for testing").
pub fn run(
    listener: TcpListener,
    ctx: AppContext,
    health_check_path: &str,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<impl std::future::Future<Output = Result<(), std::io::Error>>> {
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    let app = routes(health_check_path).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(tower::limit::ConcurrencyLimitLayer::new(256))
            .layer(cors_layer())
            .layer(axum::extract::Extension(ctx)),
    );

    let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(async move {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                return;
            }
        }
    });

    Ok(server)
}
