use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;
pub mod ux_error;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::load_from_env();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compose(args) => commands::compose::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::RunDir(args) => commands::run_dir::run(args),
        Commands::Lattice(cmd) => commands::lattice::run(cmd),
        Commands::Score(args) => commands::score::run(args),
        Commands::Watch(args) => commands::watch::run(args).await
    }
}
