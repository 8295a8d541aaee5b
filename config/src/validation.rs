//! # Configuration Validation
//!
//! Provides validation for run configurations using the `validator` crate.

use crate::config::RunConfig;
use errors::ComposeError;
use serde_yaml::Value;
use validator::Validate;

/// Validate a typed run configuration.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Composer, RunConfig, validate};
///
/// let composed = Composer::new("conf").compose::<&str>("main", &[]).unwrap();
/// let run = RunConfig::from_value(&composed.config).unwrap();
/// match validate(&run) {
///     Ok(()) => println!("Configuration is valid"),
///     Err(errors) => println!("Validation errors: {:?}", errors),
/// }
/// ```
///
/// ## Validation Rules
/// ### General
/// - `device`: `cpu` or `cuda`
/// - `float_precision`: 16, 32 or 64
/// - `env._target_`, `proxy._target_`: non-empty
///
/// ### Optimizer
/// - `lr`: > 0
/// - `lr_decay_gamma`: (0, 1]
/// - `method`: `adam` or `msgd`
/// - `ema_alpha`: 0-1
/// - `adam_beta1`, `adam_beta2`: [0, 1)
/// - `n_train_steps`, `z_dim`, `lr_decay_period`: >= 1
/// - `batch_size`: at least one trajectory in total
///
/// ### GFlowNet
/// - `random_action_prob`: 0-1
///
/// ### Logger / Evaluator
/// - `project_name`: non-empty
/// - `evaluator.n`: >= 1
pub fn validate(config: &RunConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}

/// Deserialize a composed tree and validate it.
pub fn validate_value(value: &Value) -> Result<RunConfig, ComposeError> {
    let run = RunConfig::from_value(value)?;
    validate(&run).map_err(|errors| ComposeError::InvalidRunConfig {
        reason: errors.to_string()
    })?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RunConfig {
        let value: Value = serde_yaml::from_str(
            r#"
env:
  _target_: gflownet.envs.crystals.lattice_parameters.LatticeParameters
  lattice_system: triclinic
proxy:
  _target_: gflownet.proxy.box.corners.Corners
"#
        )
        .unwrap();
        RunConfig::from_value(&value).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_validate_invalid_device() {
        let mut config = valid();
        config.device = "tpu".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_cuda_any_case() {
        let mut config = valid();
        config.device = "CUDA".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_float_precision() {
        let mut config = valid();
        config.float_precision = 8;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_empty_target() {
        let mut config = valid();
        config.env.target = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_non_positive_lr() {
        let mut config = valid();
        config.gflownet.optimizer.lr = 0.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_method() {
        let mut config = valid();
        config.gflownet.optimizer.method = "sgd".to_string();
        assert!(validate(&config).is_err());

        config.gflownet.optimizer.method = "msgd".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_ema_alpha_out_of_range() {
        let mut config = valid();
        config.gflownet.optimizer.ema_alpha = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_zero_train_steps() {
        let mut config = valid();
        config.gflownet.optimizer.n_train_steps = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_empty_batch() {
        let mut config = valid();
        config.gflownet.optimizer.batch_size.forward = 0;
        assert!(validate(&config).is_err());

        config.gflownet.optimizer.batch_size.backward_replay = 4;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_huge_batch_does_not_overflow() {
        let mut config = valid();
        config.gflownet.optimizer.batch_size.forward = u64::MAX;
        config.gflownet.optimizer.batch_size.backward_dataset = u64::MAX;
        config.gflownet.optimizer.batch_size.backward_replay = 1;
        assert_eq!(config.gflownet.optimizer.batch_size.total(), u64::MAX);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_random_action_prob() {
        let mut config = valid();
        config.gflownet.random_action_prob = 1.01;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_value_reports_reason() {
        let value: Value = serde_yaml::from_str(
            "env: {_target_: ContinuousCube}\nproxy: {_target_: Corners}\ngflownet: {optimizer: {method: rmsprop}}\n"
        )
        .unwrap();
        let err = validate_value(&value).unwrap_err();
        match err {
            ComposeError::InvalidRunConfig { reason } => assert!(reason.contains("method")),
            other => panic!("unexpected error: {other:?}")
        }
    }
}
