//! # Run Directories
//!
//! Every run gets a directory (`hydra.run.dir`, typically
//! `<logdir>/<job id>/<timestamp>`) holding a `.hydra/` snapshot of what was
//! composed, which is also what a resumed run reloads.

use crate::compose::ComposedConfig;
use crate::tree::{get_path, remove_path, set_path};
use errors::ComposeError;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SNAPSHOT_DIR: &str = ".hydra";
pub const CONFIG_FILE: &str = "config.yaml";
pub const HYDRA_FILE: &str = "hydra.yaml";
pub const OVERRIDES_FILE: &str = "overrides.yaml";

const RUN_DIR_KEY: &str = "hydra.run.dir";

/// Run directory of a resolved configuration.
pub fn run_dir(config: &Value) -> Result<PathBuf, ComposeError> {
    let dir = get_path(config, RUN_DIR_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| ComposeError::KeyNotFound {
            key: RUN_DIR_KEY.to_string()
        })?;
    Ok(utils::resolve_path(dir))
}

/// Create the run directory and write the `.hydra/` snapshot.
pub fn write_run_dir(composed: &ComposedConfig) -> Result<PathBuf, ComposeError> {
    let dir = run_dir(&composed.config)?;
    let snapshot = dir.join(SNAPSHOT_DIR);
    fs::create_dir_all(&snapshot).map_err(|e| run_dir_error(&snapshot, e))?;

    let mut task_config = composed.config.clone();
    let hydra = remove_path(&mut task_config, "hydra").unwrap_or(Value::Null);
    let overrides = Value::Sequence(
        composed
            .overrides
            .iter()
            .cloned()
            .map(Value::String)
            .collect()
    );

    write_yaml(&snapshot.join(CONFIG_FILE), &task_config)?;
    write_yaml(&snapshot.join(HYDRA_FILE), &hydra)?;
    write_yaml(&snapshot.join(OVERRIDES_FILE), &overrides)?;

    info!("Run directory ready: {:?}", dir);
    Ok(dir)
}

/// Configuration saved in a run directory.
pub fn load_run_config(rundir: &Path) -> Result<Value, ComposeError> {
    let path = rundir.join(SNAPSHOT_DIR).join(CONFIG_FILE);
    crate::file_loader::load_from_yaml(&path).map_err(|e| crate::file_loader::load_failed(&path, &e))
}

/// Point a saved configuration at its run directory for resuming: logging
/// goes offline into the existing directory.
pub fn resume_config(config: &mut Value, rundir: &Path) -> Result<(), ComposeError> {
    set_path(config, "logger.do.online", Value::Bool(false))?;
    set_path(
        config,
        "logger.logdir.root",
        Value::String(rundir.display().to_string())
    )?;
    set_path(config, "logger.is_resumed", Value::Bool(true))
}

/// Most recent checkpoint of a run.
pub fn latest_checkpoint(rundir: &Path, config: &Value) -> Result<PathBuf, ComposeError> {
    let ckpts = get_path(config, "logger.logdir.ckpts")
        .and_then(Value::as_str)
        .unwrap_or("ckpts");
    let dir = rundir.join(ckpts);
    utils::find_latest_checkpoint(&dir).map_err(|e| run_dir_error(&dir, e))
}

fn write_yaml(path: &Path, value: &Value) -> Result<(), ComposeError> {
    let text = serde_yaml::to_string(value).map_err(|e| run_dir_error(path, e))?;
    fs::write(path, text).map_err(|e| run_dir_error(path, e))
}

fn run_dir_error(path: &Path, e: impl std::fmt::Display) -> ComposeError {
    ComposeError::RunDir {
        path: path.display().to_string(),
        reason: e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn composed(root: &Path) -> ComposedConfig {
        let config: Value = serde_yaml::from_str(&format!(
            r#"
seed: 1
logger:
  do: {{online: true}}
  logdir: {{root: {root}, ckpts: ckpts}}
hydra:
  run:
    dir: {root}/local/2024-03-01_12-30-05_000000
  overrides:
    task: [seed=1]
"#,
            root = root.display()
        ))
        .unwrap();
        ComposedConfig {
            config,
            choices: BTreeMap::new(),
            overrides: vec!["seed=1".to_string()]
        }
    }

    #[test]
    fn test_run_dir_missing() {
        let config: Value = serde_yaml::from_str("seed: 0").unwrap();
        assert!(matches!(
            run_dir(&config),
            Err(ComposeError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_write_and_load_snapshot() {
        let temp = tempfile::tempdir().unwrap();
        let composed = composed(temp.path());

        let dir = write_run_dir(&composed).unwrap();
        assert!(dir.ends_with("local/2024-03-01_12-30-05_000000"));

        let saved = load_run_config(&dir).unwrap();
        assert_eq!(saved["seed"].as_u64(), Some(1));
        assert!(saved.get("hydra").is_none());

        let hydra = crate::file_loader::load_from_yaml(&dir.join(".hydra/hydra.yaml")).unwrap();
        assert!(hydra["run"]["dir"].as_str().is_some());

        let overrides: Vec<String> =
            serde_yaml::from_str(&fs::read_to_string(dir.join(".hydra/overrides.yaml")).unwrap())
                .unwrap();
        assert_eq!(overrides, vec!["seed=1"]);
    }

    #[test]
    fn test_resume_config() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_run_dir(&composed(temp.path())).unwrap();

        let mut saved = load_run_config(&dir).unwrap();
        resume_config(&mut saved, &dir).unwrap();
        assert_eq!(saved["logger"]["do"]["online"], Value::Bool(false));
        assert_eq!(saved["logger"]["is_resumed"], Value::Bool(true));
        assert_eq!(
            saved["logger"]["logdir"]["root"].as_str(),
            Some(dir.display().to_string().as_str())
        );
    }

    #[test]
    fn test_latest_checkpoint() {
        let temp = tempfile::tempdir().unwrap();
        let dir = write_run_dir(&composed(temp.path())).unwrap();
        let saved = load_run_config(&dir).unwrap();

        assert!(matches!(
            latest_checkpoint(&dir, &saved),
            Err(ComposeError::RunDir { .. })
        ));

        let ckpts = dir.join("ckpts");
        fs::create_dir_all(&ckpts).unwrap();
        fs::write(ckpts.join("forward_policy_iter_100.ckpt"), b"").unwrap();
        fs::write(ckpts.join("forward_policy_iter_2000.ckpt"), b"").unwrap();
        let latest = latest_checkpoint(&dir, &saved).unwrap();
        assert!(latest.ends_with("forward_policy_iter_2000.ckpt"));
    }
}
