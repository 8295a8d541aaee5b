use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use super::ComposeArgs;
use crate::output;

#[derive(Args)]
pub struct RunDirArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    #[arg(long, help = "Create the directory and write the .hydra/ snapshot")]
    pub create: bool,

    #[arg(
        long,
        conflicts_with = "create",
        value_name = "RUN_DIR",
        help = "Prepare a saved run for resuming and print its configuration"
    )]
    pub resume: Option<PathBuf>,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub fn run(args: RunDirArgs) -> Result<()> {
    if let Some(rundir) = &args.resume {
        return resume(rundir, args.json);
    }

    let composed = args.compose.compose()?;
    let dir = if args.create {
        config::write_run_dir(&composed)?
    } else {
        config::run_dir(&composed.config)?
    };

    if args.json {
        let output = serde_json::json!({
            "run_dir": dir.display().to_string(),
            "job_id": config::job_id(),
            "created": args.create
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", dir.display());
    }
    Ok(())
}

fn resume(rundir: &Path, json: bool) -> Result<()> {
    let mut saved = config::load_run_config(rundir)
        .with_context(|| format!("No saved run in {}", rundir.display()))?;
    config::resume_config(&mut saved, rundir)?;

    let checkpoint = match config::latest_checkpoint(rundir, &saved) {
        Ok(path) => Some(path),
        Err(e) => {
            output::warn(&format!("Resuming without a checkpoint: {}", e));
            None
        }
    };

    if json {
        let output = serde_json::json!({
            "run_dir": rundir.display().to_string(),
            "checkpoint": checkpoint.map(|p| p.display().to_string()),
            "config": saved
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(path) = checkpoint {
        output::info(&format!("Latest checkpoint: {}", path.display()));
    }
    print!("{}", serde_yaml::to_string(&saved)?);
    Ok(())
}
