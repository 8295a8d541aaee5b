//! # Environments
//!
//! State spaces sampled by a GFlowNet. Every environment is a continuous
//! hyper cube at heart; the crystal environments map cube coordinates to
//! lattice parameters and keep them consistent with a lattice system.
//!
//! Environments are instantiated from a configuration node by its
//! `_target_`, see [`build_env`].

pub mod build;
pub mod cube;
pub mod lattice_parameters;
pub mod lattice_sgccg;
pub mod lattice_system;
pub mod linalg;

pub use build::build_env;
pub use cube::ContinuousCube;
pub use lattice_parameters::{LatticeBounds, LatticeParameters};
pub use lattice_sgccg::LatticeParametersSgccg;
pub use lattice_system::LatticeSystem;

use errors::EnvError;

/// A continuous action: one increment per dimension. Backward actions may
/// instead send the state straight back to the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub increments: Vec<f64>,
    pub to_source: bool
}

impl Action {
    pub fn new(increments: Vec<f64>) -> Self {
        Self {
            increments,
            to_source: false
        }
    }

    /// Backward action returning to the source state.
    pub fn to_source(n_dim: usize) -> Self {
        Self {
            increments: vec![0.0; n_dim],
            to_source: true
        }
    }
}

/// Environment interface consumed by samplers and proxies.
pub trait Environment: std::fmt::Debug + Send {
    fn n_dim(&self) -> usize;

    fn source(&self) -> &[f64];

    fn state(&self) -> &[f64];

    fn done(&self) -> bool;

    fn is_source(&self, state: &[f64]) -> bool {
        state == self.source()
    }

    /// Back to the source, not done.
    fn reset(&mut self);

    /// Replace the current state.
    fn set_state(&mut self, state: Vec<f64>, done: bool) -> Result<(), EnvError>;

    /// Apply a non-EOS action. Returns whether the action was valid; invalid
    /// actions leave the state untouched.
    fn step(&mut self, action: &Action, backward: bool) -> Result<bool, EnvError>;

    /// End-of-sequence action. Backward, it undoes a previous forward EOS.
    fn step_eos(&mut self, backward: bool) -> bool;

    fn is_valid(&self, state: &[f64]) -> bool;

    /// Convert a batch of states into the proxy's input format.
    fn states2proxy(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EnvError>;

    fn state2readable(&self, state: &[f64]) -> Result<String, EnvError>;

    fn readable2state(&self, readable: &str) -> Result<Vec<f64>, EnvError>;
}

pub(crate) fn check_dims(expected: usize, actual: usize) -> Result<(), EnvError> {
    if expected != actual {
        return Err(EnvError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Parse a comma separated list of floats, ignoring brackets and spaces.
pub(crate) fn parse_floats(readable: &str, separator: char) -> Result<Vec<f64>, EnvError> {
    let cleaned: String = readable
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']'))
        .collect();
    cleaned
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|e| EnvError::InvalidReadable {
                readable: readable.to_string(),
                reason: format!("'{s}': {e}")
            })
        })
        .collect()
}
