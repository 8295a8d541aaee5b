use anyhow::{Context, Result};
use clap::Args;
use envs::Environment;
use proxy::Proxy;

use super::ComposeArgs;
use super::lattice::{join, parse_state};
use crate::output;

#[derive(Args)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub compose: ComposeArgs,

    #[arg(
        long = "state",
        short = 'x',
        required = true,
        allow_hyphen_values = true,
        help = "State to score, comma separated (repeatable)"
    )]
    pub states: Vec<String>,

    #[arg(long, default_value_t = 1000, help = "Number of states per proxy call")]
    pub batch_size: usize,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let composed = args.compose.compose()?;
    let env_config = composed
        .config
        .get("env")
        .context("The configuration has no 'env' section")?;
    let proxy_config = composed
        .config
        .get("proxy")
        .context("The configuration has no 'proxy' section")?;

    let env = envs::build_env(env_config)?;
    let mut proxy = proxy::build_proxy(proxy_config)?;
    proxy.setup(env.n_dim());

    let states = args
        .states
        .iter()
        .map(|s| parse_state(s))
        .collect::<Result<Vec<_>>>()?;
    for state in &states {
        if !env.is_valid(state) {
            output::warn(&format!("State [{}] is not valid in this environment", join(state)));
        }
    }

    let mut rewards = Vec::with_capacity(states.len());
    for batch in utils::batch_with_rest(0, states.len(), args.batch_size.max(1)) {
        let inputs = env.states2proxy(&states[batch])?;
        rewards.extend(proxy.evaluate(&inputs)?);
    }
    let optimum = proxy.optimum()?;

    if args.json {
        let scores: Vec<_> = states
            .iter()
            .zip(&rewards)
            .map(|(state, reward)| serde_json::json!({ "state": state, "reward": reward }))
            .collect();
        let output = serde_json::json!({ "scores": scores, "optimum": optimum });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (state, reward) in states.iter().zip(&rewards) {
        println!("{}\t{}", join(state), reward);
    }
    output::info(&format!("Proxy optimum: {}", optimum));
    Ok(())
}
