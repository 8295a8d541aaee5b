//! Lattice parameters on a 6-dimensional cube.
//!
//! Cube coordinates map linearly to the edge lengths `(a, b, c)` and angles
//! `(alpha, beta, gamma)` of a unit cell. The lattice system fixes some
//! parameters (e.g. right angles) and ties others together (e.g. `a = b`);
//! those dimensions are ignored by the cube and rewritten after every step.

use crate::cube::ContinuousCube;
use crate::{Action, Environment, LatticeSystem, check_dims, parse_floats};
use errors::EnvError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const N_PARAMETERS: usize = 6;
pub const PARAMETER_NAMES: [&str; N_PARAMETERS] = ["a", "b", "c", "alpha", "beta", "gamma"];

/// Ranges of edge lengths (Angstrom) and angles (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeBounds {
    #[serde(default = "default_min_length")]
    pub min_length: f64,
    #[serde(default = "default_max_length")]
    pub max_length: f64,
    #[serde(default = "default_min_angle")]
    pub min_angle: f64,
    #[serde(default = "default_max_angle")]
    pub max_angle: f64
}

impl Default for LatticeBounds {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            min_angle: default_min_angle(),
            max_angle: default_max_angle()
        }
    }
}

fn default_min_length() -> f64 {
    1.0
}

fn default_max_length() -> f64 {
    350.0
}

fn default_min_angle() -> f64 {
    50.0
}

fn default_max_angle() -> f64 {
    150.0
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Binding {
    /// Read from this state dimension.
    Dim(usize),
    /// Constant, in real units.
    Fixed(f64)
}

#[derive(Debug, Clone, PartialEq)]
struct Constraints {
    ignored_dims: [bool; N_PARAMETERS],
    bindings: [Binding; N_PARAMETERS]
}

impl Constraints {
    fn for_system(system: LatticeSystem) -> Self {
        use Binding::{Dim, Fixed};
        use LatticeSystem::*;

        let (length_ignored, lengths) = match system {
            Cubic | Rhombohedral => ([false, true, true], [Dim(0), Dim(0), Dim(0)]),
            Hexagonal | Tetragonal => ([false, true, false], [Dim(0), Dim(0), Dim(2)]),
            Monoclinic | Orthorhombic | Triclinic => {
                ([false, false, false], [Dim(0), Dim(1), Dim(2)])
            }
        };
        let (angle_ignored, angles) = match system {
            Cubic | Orthorhombic | Tetragonal => {
                ([true, true, true], [Fixed(90.0), Fixed(90.0), Fixed(90.0)])
            }
            Hexagonal => ([true, true, true], [Fixed(90.0), Fixed(90.0), Fixed(120.0)]),
            Monoclinic => ([true, false, true], [Fixed(90.0), Dim(4), Fixed(90.0)]),
            Rhombohedral => ([false, true, true], [Dim(3), Dim(3), Dim(3)]),
            Triclinic => ([false, false, false], [Dim(3), Dim(4), Dim(5)])
        };

        let mut ignored_dims = [false; N_PARAMETERS];
        ignored_dims[..3].copy_from_slice(&length_ignored);
        ignored_dims[3..].copy_from_slice(&angle_ignored);
        let mut bindings = [Dim(0); N_PARAMETERS];
        bindings[..3].copy_from_slice(&lengths);
        bindings[3..].copy_from_slice(&angles);

        Self {
            ignored_dims,
            bindings
        }
    }
}

/// Lattice parameters environment.
#[derive(Debug, Clone)]
pub struct LatticeParameters {
    cube: ContinuousCube,
    lattice_system: LatticeSystem,
    bounds: LatticeBounds,
    constraints: Constraints
}

impl LatticeParameters {
    pub fn new(lattice_system: LatticeSystem, bounds: LatticeBounds) -> Result<Self, EnvError> {
        if bounds.min_length >= bounds.max_length || bounds.min_angle >= bounds.max_angle {
            return Err(EnvError::InvalidConfig {
                reason: format!("empty length or angle range: {bounds:?}")
            });
        }
        let constraints = Constraints::for_system(lattice_system);
        let cube = ContinuousCube::new(N_PARAMETERS)?
            .with_ignored_dims(constraints.ignored_dims.to_vec())?;
        Ok(Self {
            cube,
            lattice_system,
            bounds,
            constraints
        })
    }

    pub fn lattice_system(&self) -> LatticeSystem {
        self.lattice_system
    }

    pub fn bounds(&self) -> &LatticeBounds {
        &self.bounds
    }

    pub fn ignored_dims(&self) -> &[bool] {
        self.cube.ignored_dims()
    }

    /// Switch lattice system; the current state is left as is.
    pub fn set_lattice_system(&mut self, lattice_system: LatticeSystem) -> Result<(), EnvError> {
        debug!("Lattice system set to {}", lattice_system);
        self.lattice_system = lattice_system;
        self.constraints = Constraints::for_system(lattice_system);
        self.cube
            .set_ignored_dims(self.constraints.ignored_dims.to_vec())
    }

    fn value2length(&self, value: f64) -> f64 {
        self.bounds.min_length + value * (self.bounds.max_length - self.bounds.min_length)
    }

    fn length2value(&self, length: f64) -> f64 {
        (length - self.bounds.min_length) / (self.bounds.max_length - self.bounds.min_length)
    }

    fn value2angle(&self, value: f64) -> f64 {
        self.bounds.min_angle + value * (self.bounds.max_angle - self.bounds.min_angle)
    }

    fn angle2value(&self, angle: f64) -> f64 {
        (angle - self.bounds.min_angle) / (self.bounds.max_angle - self.bounds.min_angle)
    }

    fn to_real(&self, param: usize, value: f64) -> f64 {
        if param < 3 {
            self.value2length(value)
        } else {
            self.value2angle(value)
        }
    }

    fn to_value(&self, param: usize, real: f64) -> f64 {
        if param < 3 {
            self.length2value(real)
        } else {
            self.angle2value(real)
        }
    }

    /// Lattice parameters of a state, in Angstrom and degrees.
    pub fn parameters(&self, state: &[f64]) -> Result<[f64; N_PARAMETERS], EnvError> {
        check_dims(N_PARAMETERS, state.len())?;
        let mut params = [0.0; N_PARAMETERS];
        for (param, binding) in self.constraints.bindings.iter().enumerate() {
            params[param] = match binding {
                Binding::Dim(dim) => self.to_real(param, state[*dim]),
                Binding::Fixed(value) => *value
            };
        }
        Ok(params)
    }

    /// State for the given lattice parameters. Parameters fixed or tied by
    /// the lattice system are taken from the constraints, not from the input.
    pub fn parameters2state(&self, parameters: &[f64]) -> Result<Vec<f64>, EnvError> {
        check_dims(N_PARAMETERS, parameters.len())?;
        let mut state = self.cube.source().to_vec();
        for (param, value) in parameters.iter().enumerate() {
            if let Binding::Dim(dim) = self.constraints.bindings[param] {
                if dim == param {
                    state[dim] = self.to_value(param, *value);
                }
            }
        }
        Ok(self.apply_constraints(state))
    }

    /// Rewrite ignored dimensions from the dimension they are tied to or
    /// from their fixed value.
    fn apply_constraints(&self, mut state: Vec<f64>) -> Vec<f64> {
        if self.cube.is_source(&state) {
            return state;
        }
        for (param, ignored) in self.constraints.ignored_dims.iter().enumerate() {
            if !ignored {
                continue;
            }
            state[param] = match self.constraints.bindings[param] {
                Binding::Dim(dim) => state[dim],
                Binding::Fixed(value) => self.to_value(param, value)
            };
        }
        state
    }
}

impl Environment for LatticeParameters {
    fn n_dim(&self) -> usize {
        N_PARAMETERS
    }

    fn source(&self) -> &[f64] {
        self.cube.source()
    }

    fn state(&self) -> &[f64] {
        self.cube.state()
    }

    fn done(&self) -> bool {
        self.cube.done()
    }

    fn reset(&mut self) {
        self.cube.reset();
    }

    fn set_state(&mut self, state: Vec<f64>, done: bool) -> Result<(), EnvError> {
        self.cube.set_state(state, done)
    }

    fn step(&mut self, action: &Action, backward: bool) -> Result<bool, EnvError> {
        let valid = self.cube.step(action, backward)?;
        if valid {
            let state = self.apply_constraints(self.cube.state().to_vec());
            self.cube.set_state_unchecked(state);
        }
        Ok(valid)
    }

    fn step_eos(&mut self, backward: bool) -> bool {
        self.cube.step_eos(backward)
    }

    fn is_valid(&self, state: &[f64]) -> bool {
        let Ok(params) = self.parameters(state) else {
            return false;
        };
        let b = &self.bounds;
        params[..3]
            .iter()
            .all(|l| (b.min_length..=b.max_length).contains(l))
            && params[3..]
                .iter()
                .all(|a| (b.min_angle..=b.max_angle).contains(a))
    }

    /// Lengths then angles, in real units.
    fn states2proxy(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EnvError> {
        states
            .iter()
            .map(|state| {
                check_dims(N_PARAMETERS, state.len())?;
                Ok(state
                    .iter()
                    .enumerate()
                    .map(|(param, value)| self.to_real(param, *value))
                    .collect())
            })
            .collect()
    }

    /// `"(a, b, c), (alpha, beta, gamma)"`.
    fn state2readable(&self, state: &[f64]) -> Result<String, EnvError> {
        let [a, b, c, alpha, beta, gamma] = self.parameters(state)?;
        Ok(format!(
            "({a:?}, {b:?}, {c:?}), ({alpha:?}, {beta:?}, {gamma:?})"
        ))
    }

    fn readable2state(&self, readable: &str) -> Result<Vec<f64>, EnvError> {
        let values = parse_floats(readable, ',')?;
        self.parameters2state(&values)
    }
}
