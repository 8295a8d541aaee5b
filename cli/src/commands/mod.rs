pub mod compose;
pub mod lattice;
pub mod run_dir;
pub mod score;
pub mod validate;
pub mod watch;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::loader::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_NAME};
use config::{ComposedConfig, Composer};
use std::path::PathBuf;

use crate::ux_error;

#[derive(Parser)]
#[command(
    name = "gflownet",
    author,
    version,
    about = "gflownet - compose and inspect GFlowNet run configurations",
    long_about = "Configurations are composed from a directory of YAML files: the primary config's \
                  defaults list selects one option per group (env, gflownet, proxy, ...), \
                  experiments override the selection, and command-line overrides come last.\n\n\
                  Overrides: group=option, key=value, +key=value, ++key=value, ~key"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Compose a configuration and print it")]
    Compose(compose::ComposeCmdArgs),

    #[command(about = "Compose a configuration and validate it")]
    Validate(validate::ValidateArgs),

    #[command(about = "Print (or create) the run directory of a configuration")]
    RunDir(run_dir::RunDirArgs),

    #[command(subcommand, about = "Convert between lattice parameters and environment states")]
    Lattice(lattice::LatticeCommand),

    #[command(about = "Score environment states with the configured proxy")]
    Score(score::ScoreArgs),

    #[command(about = "Recompose whenever a config file changes")]
    Watch(watch::WatchArgs)
}

/// Where to find the configuration and what to override.
#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    #[arg(
        long,
        short = 'd',
        env = "GFN_CONFIG_DIR",
        default_value = DEFAULT_CONFIG_DIR,
        help = "Directory holding the configuration tree"
    )]
    pub config_dir: PathBuf,

    #[arg(
        long,
        short = 'c',
        env = "GFN_CONFIG_NAME",
        default_value = DEFAULT_CONFIG_NAME,
        help = "Primary config name (without extension)"
    )]
    pub config_name: String,

    #[arg(help = "Overrides: group=option, key=value, +key=value, ++key=value, ~key")]
    pub overrides: Vec<String>
}

impl ComposeArgs {
    pub fn composer(&self) -> Composer {
        Composer::new(self.config_dir.clone())
    }

    /// Compose with interpolations resolved, reporting failures in detail.
    pub fn compose(&self) -> Result<ComposedConfig> {
        let composer = self.composer();
        composer
            .compose(&self.config_name, &self.overrides)
            .map_err(|e| report(&e, &composer))
    }

    pub fn compose_unresolved(&self) -> Result<ComposedConfig> {
        let composer = self.composer();
        composer
            .compose_unresolved(&self.config_name, &self.overrides)
            .map_err(|e| report(&e, &composer))
    }
}

fn report(err: &errors::ComposeError, composer: &Composer) -> anyhow::Error {
    ux_error::from_compose_error(err, composer).display();
    anyhow::anyhow!("Composition failed: {}", err)
}
