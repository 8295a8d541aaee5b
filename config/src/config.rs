//! # Run Configuration Structures
//!
//! Typed view of a composed run configuration.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Keep keys they do not model in a flattened `extra` map, so nothing in
//!   the composed tree is lost on a round trip

use errors::ComposeError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use utils::{Device, FloatPrecision};
use validator::Validate;

/// Keys not modelled by a structure.
pub type Extra = BTreeMap<String, Value>;

/// Top-level run configuration.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Composer, RunConfig};
///
/// let composed = Composer::new("conf").compose::<&str>("main", &[]).unwrap();
/// let run = RunConfig::from_value(&composed.config).unwrap();
/// println!("lr: {}", run.gflownet.optimizer.lr);
/// ```
///
/// ## Fields
/// - `device`: `cpu` or `cuda`
/// - `float_precision`: 16, 32 or 64
/// - `env`, `proxy`: instantiation targets with free-form parameters
/// - `gflownet`: agent and optimizer hyperparameters
/// - `policy`, `buffer`, `logger`, `evaluator`, `user`: remaining namespaces
///
/// ## Validation
/// All nested configurations must pass their own validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RunConfig {
    #[serde(default = "default_device")]
    #[validate(custom(function = "validate_device"))]
    pub device: String,

    #[serde(default = "default_float_precision")]
    #[validate(custom(function = "validate_float_precision"))]
    pub float_precision: u32,

    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub n_samples: u64,

    #[validate(nested)]
    pub env: TargetConfig,

    #[serde(default)]
    #[validate(nested)]
    pub gflownet: GFlowNetConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub buffer: Extra,

    #[validate(nested)]
    pub proxy: TargetConfig,

    #[serde(default)]
    #[validate(nested)]
    pub logger: LoggerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub hydra: Value,

    #[serde(flatten)]
    pub extra: Extra
}

impl RunConfig {
    /// Deserialize from a composed (and resolved) tree.
    pub fn from_value(value: &Value) -> Result<Self, ComposeError> {
        serde_yaml::from_value(value.clone()).map_err(|e| ComposeError::InvalidRunConfig {
            reason: e.to_string()
        })
    }

    pub fn to_value(&self) -> Result<Value, ComposeError> {
        serde_yaml::to_value(self).map_err(|e| ComposeError::InvalidRunConfig {
            reason: e.to_string()
        })
    }

    /// Device to run on, given whether a GPU is present.
    pub fn resolve_device(&self, cuda_available: bool) -> Device {
        Device::resolve(&self.device, cuda_available)
    }

    pub fn precision(&self) -> Result<FloatPrecision, ComposeError> {
        FloatPrecision::try_from(self.float_precision).map_err(|e| {
            ComposeError::InvalidRunConfig {
                reason: e.to_string()
            }
        })
    }
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_float_precision() -> u32 {
    32
}

fn validate_device(value: &str) -> Result<(), validator::ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "cpu" | "cuda" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid device"))
    }
}

fn validate_float_precision(value: u32) -> Result<(), validator::ValidationError> {
    FloatPrecision::try_from(value)
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("Invalid float precision"))
}

/// A node instantiated by its `_target_` (environments, proxies).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Default)]
pub struct TargetConfig {
    #[serde(rename = "_target_")]
    #[validate(length(min = 1))]
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(flatten)]
    pub params: Extra
}

impl TargetConfig {
    /// Last path segment of `_target_`, e.g. `Corners` for
    /// `gflownet.proxy.box.corners.Corners`.
    pub fn target_name(&self) -> &str {
        self.target.rsplit('.').next().unwrap_or(&self.target)
    }

    /// Back to a tree, with `_target_` included.
    pub fn to_value(&self) -> Value {
        serde_yaml::to_value(self).unwrap_or(Value::Null)
    }
}

/// GFlowNet agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GFlowNetConfig {
    #[serde(rename = "_target_", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub optimizer: OptimizerConfig,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub random_action_prob: f64,

    #[serde(default)]
    pub replay_capacity: u64,

    #[serde(flatten)]
    pub extra: Extra
}

impl Default for GFlowNetConfig {
    fn default() -> Self {
        Self {
            target: None,
            optimizer: OptimizerConfig::default(),
            random_action_prob: 0.0,
            replay_capacity: 0,
            extra: Extra::new()
        }
    }
}

/// Optimizer hyperparameters.
///
/// ## Fields
/// - `loss`: loss name (e.g. `flowmatch`, `trajectorybalance`)
/// - `lr`: learning rate, strictly positive
/// - `lr_decay_period` / `lr_decay_gamma`: step decay of the learning rate
/// - `lr_z_mult`: learning rate multiplier for the log-partition estimate
/// - `method`: `adam` or `msgd`
/// - `ema_alpha`: 0-1
/// - `n_train_steps`: at least 1
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct OptimizerConfig {
    #[serde(default = "default_loss")]
    #[validate(length(min = 1))]
    pub loss: String,

    #[serde(default = "default_lr")]
    #[validate(range(exclusive_min = 0.0))]
    pub lr: f64,

    #[serde(default = "default_lr_decay_period")]
    #[validate(range(min = 1))]
    pub lr_decay_period: u64,

    #[serde(default = "default_lr_decay_gamma")]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub lr_decay_gamma: f64,

    #[serde(default = "default_z_dim")]
    #[validate(range(min = 1))]
    pub z_dim: u64,

    #[serde(default = "default_lr_z_mult")]
    pub lr_z_mult: f64,

    #[serde(default = "default_method")]
    #[validate(custom(function = "validate_method"))]
    pub method: String,

    #[serde(default)]
    pub early_stopping: f64,

    #[serde(default = "default_ema_alpha")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub ema_alpha: f64,

    #[serde(default = "default_adam_beta1")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub adam_beta1: f64,

    #[serde(default = "default_adam_beta2")]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub adam_beta2: f64,

    #[serde(default = "default_momentum")]
    pub momentum: f64,

    #[serde(default)]
    #[validate(nested)]
    pub batch_size: BatchSizeConfig,

    #[serde(default = "default_train_to_sample_ratio")]
    pub train_to_sample_ratio: u64,

    #[serde(default = "default_n_train_steps")]
    #[validate(range(min = 1))]
    pub n_train_steps: u64,

    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub clip_grad_norm: f64,

    #[serde(flatten)]
    pub extra: Extra
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            loss: default_loss(),
            lr: default_lr(),
            lr_decay_period: default_lr_decay_period(),
            lr_decay_gamma: default_lr_decay_gamma(),
            z_dim: default_z_dim(),
            lr_z_mult: default_lr_z_mult(),
            method: default_method(),
            early_stopping: 0.0,
            ema_alpha: default_ema_alpha(),
            adam_beta1: default_adam_beta1(),
            adam_beta2: default_adam_beta2(),
            momentum: default_momentum(),
            batch_size: BatchSizeConfig::default(),
            train_to_sample_ratio: default_train_to_sample_ratio(),
            n_train_steps: default_n_train_steps(),
            clip_grad_norm: 0.0,
            extra: Extra::new()
        }
    }
}

fn default_loss() -> String {
    "flowmatch".to_string()
}

fn default_lr() -> f64 {
    0.0001
}

fn default_lr_decay_period() -> u64 {
    1_000_000
}

fn default_lr_decay_gamma() -> f64 {
    0.5
}

fn default_z_dim() -> u64 {
    16
}

fn default_lr_z_mult() -> f64 {
    10.0
}

fn default_method() -> String {
    "adam".to_string()
}

fn default_ema_alpha() -> f64 {
    0.5
}

fn default_adam_beta1() -> f64 {
    0.9
}

fn default_adam_beta2() -> f64 {
    0.999
}

fn default_momentum() -> f64 {
    0.9
}

fn default_train_to_sample_ratio() -> u64 {
    1
}

fn default_n_train_steps() -> u64 {
    20000
}

fn validate_method(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "adam" | "msgd" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid optimizer method"))
    }
}

/// Number of trajectories per training batch, by origin.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_batch_not_empty"))]
pub struct BatchSizeConfig {
    #[serde(default = "default_forward_batch")]
    pub forward: u64,

    #[serde(default)]
    pub backward_dataset: u64,

    #[serde(default)]
    pub backward_replay: u64
}

impl Default for BatchSizeConfig {
    fn default() -> Self {
        Self {
            forward: default_forward_batch(),
            backward_dataset: 0,
            backward_replay: 0
        }
    }
}

impl BatchSizeConfig {
    pub fn total(&self) -> u64 {
        self.forward
            .saturating_add(self.backward_dataset)
            .saturating_add(self.backward_replay)
    }
}

fn default_forward_batch() -> u64 {
    10
}

fn validate_batch_not_empty(batch: &BatchSizeConfig) -> Result<(), validator::ValidationError> {
    if batch.total() == 0 {
        return Err(validator::ValidationError::new("Empty batch"));
    }
    Ok(())
}

/// Forward and backward policy models. `backward: null` shares or derives
/// the backward policy from the forward one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub forward: Option<Value>,

    #[serde(default)]
    pub backward: Option<Value>,

    #[serde(default)]
    pub shared: Option<Value>,

    #[serde(flatten)]
    pub extra: Extra
}

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LoggerConfig {
    #[serde(rename = "do", default)]
    pub do_: LoggerDo,

    #[serde(default = "default_project_name")]
    #[validate(length(min = 1))]
    pub project_name: String,

    #[serde(default)]
    pub logdir: LoggerLogdir,

    #[serde(default)]
    pub is_resumed: bool,

    #[serde(flatten)]
    pub extra: Extra
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            do_: LoggerDo::default(),
            project_name: default_project_name(),
            logdir: LoggerLogdir::default(),
            is_resumed: false,
            extra: Extra::new()
        }
    }
}

fn default_project_name() -> String {
    "gflownet".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggerDo {
    #[serde(default)]
    pub online: bool,

    #[serde(flatten)]
    pub extra: Extra
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggerLogdir {
    #[serde(default = "default_logdir_root")]
    pub root: String,

    #[serde(default = "default_ckpts")]
    pub ckpts: String,

    #[serde(flatten)]
    pub extra: Extra
}

impl Default for LoggerLogdir {
    fn default() -> Self {
        Self {
            root: default_logdir_root(),
            ckpts: default_ckpts(),
            extra: Extra::new()
        }
    }
}

fn default_logdir_root() -> String {
    "./logs".to_string()
}

fn default_ckpts() -> String {
    "ckpts".to_string()
}

/// Evaluation schedule. A non-positive period disables the evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct EvaluatorConfig {
    #[serde(default = "default_period")]
    pub period: i64,

    #[serde(default = "default_n")]
    #[validate(range(min = 1))]
    pub n: u64,

    #[serde(default = "default_checkpoints_period")]
    pub checkpoints_period: i64,

    #[serde(flatten)]
    pub extra: Extra
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            n: default_n(),
            checkpoints_period: default_checkpoints_period(),
            extra: Extra::new()
        }
    }
}

fn default_period() -> i64 {
    100
}

fn default_n() -> u64 {
    1000
}

fn default_checkpoints_period() -> i64 {
    1000
}

/// Per-user paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub logdir: UserLogdir,

    #[serde(flatten)]
    pub extra: Extra
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserLogdir {
    #[serde(default = "default_logdir_root")]
    pub root: String,

    #[serde(flatten)]
    pub extra: Extra
}

impl Default for UserLogdir {
    fn default() -> Self {
        Self {
            root: default_logdir_root(),
            extra: Extra::new()
        }
    }
}
