use anyhow::Result;
use clap::Args;

use super::ComposeArgs;
use crate::output;

#[derive(Args)]
pub struct ComposeCmdArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    #[arg(long, help = "Output as JSON")]
    pub json: bool,

    #[arg(long, help = "Keep ${...} interpolations unresolved")]
    pub unresolved: bool,

    #[arg(long, help = "Print only the selected option of every group")]
    pub choices: bool
}

pub fn run(args: ComposeCmdArgs) -> Result<()> {
    let composed = if args.unresolved {
        args.compose.compose_unresolved()?
    } else {
        args.compose.compose()?
    };

    if args.choices {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&composed.choices)?);
        } else {
            output::header("Choices");
            for (group, option) in &composed.choices {
                output::field(group, option.as_deref().unwrap_or("null"));
            }
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&composed.config)?);
    } else {
        print!("{}", serde_yaml::to_string(&composed.config)?);
    }
    Ok(())
}
