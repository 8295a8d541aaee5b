//! Instantiation of environments from configuration nodes.

use crate::{ContinuousCube, Environment, LatticeBounds, LatticeParameters, LatticeParametersSgccg, LatticeSystem};
use errors::EnvError;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CubeSettings {
    #[serde(default = "default_n_dim")]
    n_dim: usize,
    #[serde(default)]
    ignored_dims: Option<Vec<bool>>
}

fn default_n_dim() -> usize {
    2
}

#[derive(Debug, Deserialize)]
struct LatticeSettings {
    #[serde(default)]
    lattice_system: LatticeSystem,
    #[serde(flatten)]
    bounds: LatticeBounds
}

/// Last segment of a dotted `_target_`.
pub fn target_name(target: &str) -> &str {
    target.rsplit('.').next().unwrap_or(target)
}

/// Build the environment described by `config` (an `env` node).
pub fn build_env(config: &Value) -> Result<Box<dyn Environment>, EnvError> {
    let target = config
        .get("_target_")
        .and_then(Value::as_str)
        .ok_or_else(|| EnvError::InvalidConfig {
            reason: "missing '_target_'".to_string()
        })?;

    info!("Building environment {}", target);
    match target_name(target) {
        "ContinuousCube" => {
            let settings: CubeSettings = settings(config)?;
            let cube = ContinuousCube::new(settings.n_dim)?;
            let cube = match settings.ignored_dims {
                Some(mask) => cube.with_ignored_dims(mask)?,
                None => cube
            };
            Ok(Box::new(cube))
        }
        "LatticeParameters" => {
            let settings: LatticeSettings = settings(config)?;
            Ok(Box::new(LatticeParameters::new(
                settings.lattice_system,
                settings.bounds
            )?))
        }
        "LatticeParametersSGCCG" | "LatticeParametersSgccg" => {
            let settings: LatticeSettings = settings(config)?;
            Ok(Box::new(LatticeParametersSgccg::new(settings.lattice_system)?))
        }
        _ => Err(EnvError::UnknownTarget {
            target: target.to_string()
        })
    }
}

fn settings<T: serde::de::DeserializeOwned>(config: &Value) -> Result<T, EnvError> {
    serde_yaml::from_value(config.clone()).map_err(|e| EnvError::InvalidConfig {
        reason: e.to_string()
    })
}
