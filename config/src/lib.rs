//! # Configuration System
//!
//! Composes GFlowNet run configurations from a directory of YAML files.
//!
//! This crate provides:
//! - Configuration file loading (YAML/TOML, `# @package` headers)
//! - `defaults:` lists with config groups, `_self_` and `override` directives
//! - Deep merge precedence (later layers win, mappings merge recursively)
//! - Command-line overrides (`key=value`, `+key=value`, `++key=value`, `~key`)
//! - Interpolation (`${a.b}`, `${oc.env:VAR,default}`, `${now:FORMAT}`)
//! - A typed, validated run configuration
//! - Run directories and resume support
//! - Hot reload functionality

pub mod compose;
pub mod config;
pub mod defaults;
pub mod file_loader;
pub mod hot_reload;
pub mod interpolation;
pub mod loader;
pub mod overrides;
pub mod precedence;
pub mod rundir;
pub mod tree;
pub mod validation;

pub use compose::{Choices, ComposedConfig, Composer};
pub use config::{
    BatchSizeConfig, EvaluatorConfig, GFlowNetConfig, LoggerConfig, OptimizerConfig,
    PolicyConfig, RunConfig, TargetConfig, UserConfig,
};
pub use file_loader::{load_from_file, load_from_toml, load_from_yaml};
pub use hot_reload::watch_config;
pub use loader::{EnvSettings, job_id, load_from_env};
pub use overrides::{Override, OverrideKind};
pub use precedence::{merge_layers, merge_values};
pub use rundir::{latest_checkpoint, load_run_config, resume_config, run_dir, write_run_dir};
pub use validation::{validate, validate_value};
