mod serve;

use std::path::PathBuf;

pub use serve::Args as ServeArgs;

#[derive(clap::Parser, Debug)]
#[command(name = "queue-coordinator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Runs the coordinator's HTTP server and background loops.
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Path to the coordinator's TOML config file. Defaults to
    /// `./config/coordinator.toml`.
    #[arg(long, env = "COORDINATOR_CONFIG")]
    pub config_path: Option<PathBuf>,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => serve::run(args),
    }
}
