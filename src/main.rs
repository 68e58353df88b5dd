use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = queue_coordinator::cmd::Cli::parse();
    queue_coordinator::cmd::run(cli)
}
