use anyhow::Result;
use clap::Args;

use super::ComposeArgs;
use crate::{output, ux_error};

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let composed = args.compose.compose()?;

    let run = match config::validate_value(&composed.config) {
        Ok(run) => run,
        Err(e) => {
            if args.json {
                let output = serde_json::json!({ "valid": false, "error": e.to_string() });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if let errors::ComposeError::InvalidRunConfig { reason } = &e {
                ux_error::invalid_run_config(reason).display();
            } else {
                output::error(&e.to_string());
            }
            return Err(anyhow::anyhow!("Validation failed"));
        }
    };
    let precision = run.precision()?;

    if args.json {
        let output = serde_json::json!({
            "valid": true,
            "env": run.env.target,
            "proxy": run.proxy.target,
            "device": run.device,
            "float_precision": run.float_precision,
            "batch_size": run.gflownet.optimizer.batch_size.total()
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    output::success(&format!(
        "Configuration '{}' is valid",
        args.compose.config_name
    ));
    output::field("env", &run.env.target);
    output::field("proxy", &run.proxy.target);
    output::field("device", &run.device);
    output::field("float_precision", &format!("{:?}", precision));
    output::field("optimizer", &format!(
        "{} lr={} steps={}",
        run.gflownet.optimizer.method,
        run.gflownet.optimizer.lr,
        run.gflownet.optimizer.n_train_steps
    ));
    output::field(
        "batch_size",
        &run.gflownet.optimizer.batch_size.total().to_string()
    );
    Ok(())
}
