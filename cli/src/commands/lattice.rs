use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use envs::{Environment, LatticeBounds, LatticeParameters, LatticeParametersSgccg, LatticeSystem};

use crate::output;

#[derive(Subcommand)]
pub enum LatticeCommand {
    #[command(about = "Convert lattice parameters, e.g. '(3, 3, 5), (90, 90, 120)', to a state")]
    ToState(ToStateArgs),

    #[command(about = "Convert a comma separated state to lattice parameters")]
    ToReadable(ToReadableArgs)
}

#[derive(Args)]
pub struct LatticeOpts {
    #[arg(long, short = 's', default_value = "triclinic", help = "Lattice system")]
    pub system: String,

    #[arg(long, help = "Use the space-group-constrained projection environment")]
    pub projected: bool,

    #[arg(long, default_value_t = LatticeBounds::default().min_length)]
    pub min_length: f64,

    #[arg(long, default_value_t = LatticeBounds::default().max_length)]
    pub max_length: f64,

    #[arg(long, default_value_t = LatticeBounds::default().min_angle)]
    pub min_angle: f64,

    #[arg(long, default_value_t = LatticeBounds::default().max_angle)]
    pub max_angle: f64,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

#[derive(Args)]
pub struct ToStateArgs {
    #[command(flatten)]
    pub opts: LatticeOpts,

    #[arg(help = "Lattice parameters '(a, b, c), (alpha, beta, gamma)'")]
    pub readable: String
}

#[derive(Args)]
pub struct ToReadableArgs {
    #[command(flatten)]
    pub opts: LatticeOpts,

    #[arg(help = "State values, comma separated", allow_hyphen_values = true)]
    pub state: String
}

pub fn run(cmd: LatticeCommand) -> Result<()> {
    match cmd {
        LatticeCommand::ToState(args) => to_state(args),
        LatticeCommand::ToReadable(args) => to_readable(args)
    }
}

fn build(opts: &LatticeOpts) -> Result<Box<dyn Environment>> {
    let system = LatticeSystem::parse(&opts.system)?;
    if opts.projected {
        return Ok(Box::new(LatticeParametersSgccg::new(system)?));
    }
    let bounds = LatticeBounds {
        min_length: opts.min_length,
        max_length: opts.max_length,
        min_angle: opts.min_angle,
        max_angle: opts.max_angle
    };
    Ok(Box::new(LatticeParameters::new(system, bounds)?))
}

fn to_state(args: ToStateArgs) -> Result<()> {
    let env = build(&args.opts)?;
    let state = env
        .readable2state(&args.readable)
        .with_context(|| format!("Cannot convert '{}'", args.readable))?;
    let readable = env.state2readable(&state)?;
    let valid = env.is_valid(&state);

    if args.opts.json {
        let output = serde_json::json!({
            "system": args.opts.system,
            "state": state,
            "readable": readable,
            "valid": valid
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", join(&state));
    if !valid {
        output::warn(&format!("{} is outside the environment bounds", readable));
    }
    Ok(())
}

fn to_readable(args: ToReadableArgs) -> Result<()> {
    let env = build(&args.opts)?;
    let state = parse_state(&args.state)?;
    let readable = env.state2readable(&state)?;

    if args.opts.json {
        let output = serde_json::json!({
            "system": args.opts.system,
            "state": state,
            "readable": readable,
            "valid": env.is_valid(&state)
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", readable);
    Ok(())
}

/// Parse `x1,x2,...` into a state.
pub fn parse_state(text: &str) -> Result<Vec<f64>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("'{}' is not a number", s))
        })
        .collect()
}

pub fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(",")
}
