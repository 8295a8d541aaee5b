//! # Environment Variable Loader
//!
//! Reads the few settings that come from the process environment rather than
//! from configuration files.
//!
//! # Variables
//! - `SLURM_JOB_ID`: names run output directories (fallback `local`)
//! - `GFN_CONFIG_DIR`: configuration search path (default `./conf`)
//! - `GFN_CONFIG_NAME`: primary config name (default `main`)
//! - `GFN_LOG_LEVEL`: log filter used when `RUST_LOG` is unset (default `info`)

use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_DIR: &str = "conf";
pub const DEFAULT_CONFIG_NAME: &str = "main";
pub const LOCAL_JOB_ID: &str = "local";

/// Settings taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    pub job_id: String,
    pub config_dir: PathBuf,
    pub config_name: String,
    pub log_level: String
}

/// Load settings from environment variables.
///
/// ## Usage
/// ```rust,no_run
/// let settings = config::load_from_env();
/// println!("job: {}", settings.job_id);
/// ```
pub fn load_from_env() -> EnvSettings {
    EnvSettings {
        job_id: job_id(),
        config_dir: env::var("GFN_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR)),
        config_name: env::var("GFN_CONFIG_NAME")
            .unwrap_or_else(|_| DEFAULT_CONFIG_NAME.to_string()),
        log_level: env::var("GFN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    }
}

/// Scheduler job identifier, `local` outside of SLURM.
pub fn job_id() -> String {
    env::var("SLURM_JOB_ID")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| LOCAL_JOB_ID.to_string())
}

/// Parse an environment variable into `T`.
pub fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}
