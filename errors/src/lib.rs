//! # GFlowNet Config Errors
//!
//! Error types shared by the configuration composer, the environments and the
//! proxies.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields everywhere so messages stay stable when variants grow

use thiserror::Error;

/// Configuration composition errors
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Config '{name}' not found in search path {search_path}")]
    ConfigNotFound { name: String, search_path: String },

    #[error("Failed to load {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Invalid defaults entry in {config}: {reason}")]
    InvalidDefaultsEntry { config: String, reason: String },

    #[error("Could not override '{group}'. No match in the defaults list")]
    OverrideNoMatch { group: String },

    #[error("Defaults selection did not settle after {passes} passes")]
    OverrideCycle { passes: usize },

    #[error("Invalid override '{text}': {reason}")]
    InvalidOverride { text: String, reason: String },

    #[error("Could not override '{key}'. Key is not in the config, use '+{key}=...' to add it")]
    KeyNotFound { key: String },

    #[error("Could not append '{key}'. Key already exists, use '++{key}=...' to force it")]
    KeyAlreadyExists { key: String },

    #[error("Could not delete '{key}': {reason}")]
    DeleteMismatch { key: String, reason: String },

    #[error("Node at '{path}' is not a mapping")]
    NotAMapping { path: String },

    #[error("Interpolation key '{key}' not found")]
    InterpolationKeyNotFound { key: String },

    #[error("Interpolation cycle detected at '{key}'")]
    InterpolationCycle { key: String },

    #[error("Environment variable '{name}' not set and no default given")]
    MissingEnvVar { name: String },

    #[error("Unsupported resolver '{resolver}'")]
    UnsupportedResolver { resolver: String },

    #[error("Invalid run configuration: {reason}")]
    InvalidRunConfig { reason: String },

    #[error("Run directory error at {path}: {reason}")]
    RunDir { path: String, reason: String }
}

/// Environment errors
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid lattice system: {name}")]
    InvalidLatticeSystem { name: String },

    #[error("Expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cannot parse readable state '{readable}': {reason}")]
    InvalidReadable { readable: String, reason: String },

    #[error("Lattice parameters do not form a valid cell: {reason}")]
    InvalidLattice { reason: String },

    #[error("Unknown environment target: {target}")]
    UnknownTarget { target: String },

    #[error("Invalid environment config: {reason}")]
    InvalidConfig { reason: String }
}

/// Proxy errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Proxy {proxy} used before setup")]
    NotSetUp { proxy: String },

    #[error("State has {actual} dimensions, proxy expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown proxy target: {target}")]
    UnknownTarget { target: String },

    #[error("Invalid proxy config: {reason}")]
    InvalidConfig { reason: String }
}

/// Utility errors
#[derive(Debug, Error)]
pub enum UtilError {
    #[error("No checkpoints found in {dir} with pattern iter_* or *final*")]
    NoCheckpoint { dir: String },

    #[error("Invalid precision {value}, expected one of {allowed}")]
    InvalidPrecision { value: u32, allowed: String },

    #[error("IO error on {path}: {reason}")]
    Io { path: String, reason: String }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_error_messages_name_the_key() {
        let err = ComposeError::KeyNotFound {
            key: "gflownet.optimizer.lr".to_string()
        };
        let msg = err.to_string();
        assert!(msg.contains("gflownet.optimizer.lr"));
        assert!(msg.contains("+gflownet.optimizer.lr=..."));
    }

    #[test]
    fn test_override_no_match_message() {
        let err = ComposeError::OverrideNoMatch {
            group: "env".to_string()
        };
        assert_eq!(
            err.to_string(),
            "Could not override 'env'. No match in the defaults list"
        );
    }

    #[test]
    fn test_no_checkpoint_message() {
        let err = UtilError::NoCheckpoint {
            dir: "/runs/ckpts".to_string()
        };
        assert!(err.to_string().contains("/runs/ckpts"));
    }
}
