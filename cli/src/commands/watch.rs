use anyhow::Result;
use clap::Args;
use config::hot_reload::{ConfigReloadEvent, is_config_file};
use config::precedence::diff_changes;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use super::ComposeArgs;
use crate::output;

const DEFAULT_DEBOUNCE_MS: u64 = 200;

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    #[arg(
        long,
        help = "Milliseconds to wait for more changes before recomposing [env: GFN_WATCH_DEBOUNCE_MS]"
    )]
    pub debounce_ms: Option<u64>
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let debounce = Duration::from_millis(args.debounce_ms.unwrap_or_else(|| {
        config::loader::parse_env("GFN_WATCH_DEBOUNCE_MS").unwrap_or(DEFAULT_DEBOUNCE_MS)
    }));

    let mut current = args.compose.compose_unresolved()?.config;
    output::info(&format!(
        "Watching {} for changes (Ctrl-C to stop)",
        args.compose.config_dir.display()
    ));

    let (_tx, mut rx) = config::watch_config(&args.compose.config_dir).await?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                if !triggers_recompose(&event) {
                    continue;
                }

                tokio::time::sleep(debounce).await;
                while rx.try_recv().is_ok() {}

                match args.compose.compose_unresolved() {
                    Ok(composed) => {
                        let changes = diff_changes(&current, &composed.config);
                        if changes.is_empty() {
                            info!("Recomposed, no changes");
                        } else {
                            output::header("Configuration changed");
                            for change in &changes {
                                println!("  {}", change);
                            }
                        }
                        current = composed.config;
                    }
                    Err(e) => warn!("Keeping previous configuration: {}", e)
                }
            }
        }
    }

    Ok(())
}

fn triggers_recompose(event: &ConfigReloadEvent) -> bool {
    match event {
        ConfigReloadEvent::Ready => false,
        ConfigReloadEvent::Error { path, error } => {
            output::error(&format!("Watcher error on {}: {}", path.display(), error));
            false
        }
        other => other.path().is_some_and(is_config_file)
    }
}
