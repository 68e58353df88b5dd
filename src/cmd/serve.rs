use std::net::TcpListener;

use tracing::info;

use crate::config;
use crate::coordinator::Coordinator;
use crate::startup;

use super::ConfigArgs;

#[derive(clap::Args, Debug)]
pub struct Args {
    #[clap(flatten)]
    config: ConfigArgs,
}

/// Runs the coordinator: loads configuration, connects to the placement
/// store, registers brokers, starts the background loops, and serves the
/// northbound HTTP surface until a shutdown signal arrives.
pub fn run(args: Args) -> anyhow::Result<()> {
    let settings = config::load_settings(args.config.config_path)?;
    let listener = TcpListener::bind(settings.address())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move { serve(settings, listener).await })
}

async fn serve(settings: config::Settings, listener: TcpListener) -> anyhow::Result<()> {
    let pool = startup::connect_to_postgres(&settings.postgres).await?;
    let health_check_path = settings.health_check_path.clone();

    let coordinator = Coordinator::new(settings, pool);
    coordinator.spawn_background_loops();
    coordinator.spawn_shutdown_listener();

    let server = startup::run(
        listener,
        coordinator.context(),
        &health_check_path,
        coordinator.shutdown_receiver(),
    )?;

    info!("coordinator listening");
    server.await?;

    coordinator.shutdown();
    Ok(())
}
