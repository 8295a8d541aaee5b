//! Lattice parameters through a projection space of symmetric matrices.
//!
//! Three representations are involved:
//!
//! - **state**: the 6-dimensional cube, `[0, 1]` per dimension;
//! - **projection**: coefficients `k1..k6` of the basis `B1..B6` of 3x3
//!   symmetric matrices, each within its own bounds, linear in the state;
//! - **lattice**: `(a, b, c, alpha, beta, gamma)`, obtained from
//!   `S = sum(k_i B_i)` as `J = exp(2S)`, with `a = sqrt(J_00)` and the
//!   angles from the normalised off-diagonal entries of `J`.
//!
//! Every point of the projection box maps to a cell of positive volume, so
//! trajectories never leave the space of valid lattices.

use crate::cube::ContinuousCube;
use crate::linalg::{Matrix3, add, expm_symmetric, logm_spd, scale};
use crate::{Action, Environment, LatticeSystem, check_dims, parse_floats};
use errors::EnvError;
use tracing::debug;

pub const N_PARAMETERS: usize = 6;

pub const PROJECTION_MIN: [f64; N_PARAMETERS] = [-1.5, -1.5, -1.5, -4.5, -3.0, -1.5];
pub const PROJECTION_MAX: [f64; N_PARAMETERS] = [1.5, 1.5, 1.5, 4.5, 3.0, 7.0];

/// Symmetric basis `B1..B6`.
pub const BASIS: [Matrix3; N_PARAMETERS] = [
    [[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
    [[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
    [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
    [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 0.0]],
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -2.0]],
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
];

type Slots<T> = [Option<T>; N_PARAMETERS];

#[derive(Debug, Clone, PartialEq)]
struct Constraints {
    ignored_dims: [bool; N_PARAMETERS],
    projection_tied: Slots<usize>,
    projection_fixed: Slots<f64>,
    lattice_tied: Slots<usize>,
    lattice_fixed: Slots<f64>
}

impl Constraints {
    fn for_system(system: LatticeSystem) -> Self {
        const FREE_IDX: Slots<usize> = [None; N_PARAMETERS];
        const FREE: Slots<f64> = [None; N_PARAMETERS];
        const RIGHT_ANGLES: Slots<f64> = [None, None, None, Some(90.0), Some(90.0), Some(90.0)];
        const B_IS_A: Slots<usize> = [None, Some(0), None, None, None, None];

        match system {
            LatticeSystem::Triclinic => Self {
                ignored_dims: [false; N_PARAMETERS],
                projection_tied: FREE_IDX,
                projection_fixed: FREE,
                lattice_tied: FREE_IDX,
                lattice_fixed: FREE
            },
            // alpha = gamma = 90
            LatticeSystem::Monoclinic => Self {
                ignored_dims: [true, false, true, false, false, false],
                projection_tied: FREE_IDX,
                projection_fixed: [Some(0.0), None, Some(0.0), None, None, None],
                lattice_tied: FREE_IDX,
                lattice_fixed: [None, None, None, Some(90.0), None, Some(90.0)]
            },
            // alpha = beta = gamma = 90
            LatticeSystem::Orthorhombic => Self {
                ignored_dims: [true, true, true, false, false, false],
                projection_tied: FREE_IDX,
                projection_fixed: [Some(0.0), Some(0.0), Some(0.0), None, None, None],
                lattice_tied: FREE_IDX,
                lattice_fixed: RIGHT_ANGLES
            },
            // alpha = beta = gamma = 90, a = b
            LatticeSystem::Tetragonal => Self {
                ignored_dims: [true, true, true, true, false, false],
                projection_tied: FREE_IDX,
                projection_fixed: [Some(0.0), Some(0.0), Some(0.0), Some(0.0), None, None],
                lattice_tied: B_IS_A,
                lattice_fixed: RIGHT_ANGLES
            },
            // alpha = beta = 90, gamma = 120, a = b
            LatticeSystem::Hexagonal => Self {
                ignored_dims: [true, true, true, true, false, false],
                projection_tied: FREE_IDX,
                projection_fixed: [
                    Some(-(3.0f64.ln()) / 4.0),
                    Some(0.0),
                    Some(0.0),
                    Some(0.0),
                    None,
                    None
                ],
                lattice_tied: B_IS_A,
                lattice_fixed: [None, None, None, Some(90.0), Some(90.0), Some(120.0)]
            },
            // alpha = beta = gamma, a = b = c
            LatticeSystem::Rhombohedral => Self {
                ignored_dims: [false, true, true, true, true, false],
                projection_tied: [None, Some(0), Some(0), None, None, None],
                projection_fixed: [None, None, None, Some(0.0), Some(0.0), None],
                lattice_tied: [None, Some(0), Some(0), None, Some(3), Some(3)],
                lattice_fixed: FREE
            },
            // alpha = beta = gamma = 90, a = b = c
            LatticeSystem::Cubic => Self {
                ignored_dims: [true, true, true, true, true, false],
                projection_tied: FREE_IDX,
                projection_fixed: [Some(0.0), Some(0.0), Some(0.0), Some(0.0), Some(0.0), None],
                lattice_tied: [None, Some(0), Some(0), None, None, None],
                lattice_fixed: RIGHT_ANGLES
            }
        }
    }
}

/// Fixed values first, then ties to earlier entries, else the input value.
fn constrain(values: &[f64], tied: &Slots<usize>, fixed: &Slots<f64>) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(N_PARAMETERS);
    for i in 0..N_PARAMETERS {
        let value = match (fixed[i], tied[i]) {
            (Some(value), _) => value,
            (None, Some(idx)) if idx < out.len() => out[idx],
            _ => values[i]
        };
        out.push(value);
    }
    out
}

/// Lattice parameters environment using the projection method.
#[derive(Debug, Clone)]
pub struct LatticeParametersSgccg {
    cube: ContinuousCube,
    lattice_system: LatticeSystem,
    constraints: Constraints
}

impl LatticeParametersSgccg {
    pub fn new(lattice_system: LatticeSystem) -> Result<Self, EnvError> {
        let constraints = Constraints::for_system(lattice_system);
        let cube = ContinuousCube::new(N_PARAMETERS)?
            .with_ignored_dims(constraints.ignored_dims.to_vec())?;
        Ok(Self {
            cube,
            lattice_system,
            constraints
        })
    }

    pub fn lattice_system(&self) -> LatticeSystem {
        self.lattice_system
    }

    pub fn ignored_dims(&self) -> &[bool] {
        self.cube.ignored_dims()
    }

    pub fn set_lattice_system(&mut self, lattice_system: LatticeSystem) -> Result<(), EnvError> {
        debug!("Lattice system set to {}", lattice_system);
        self.lattice_system = lattice_system;
        self.constraints = Constraints::for_system(lattice_system);
        self.cube
            .set_ignored_dims(self.constraints.ignored_dims.to_vec())
    }

    pub fn state2projection(&self, state: &[f64]) -> Result<Vec<f64>, EnvError> {
        check_dims(N_PARAMETERS, state.len())?;
        Ok(state
            .iter()
            .zip(PROJECTION_MIN.iter().zip(&PROJECTION_MAX))
            .map(|(s, (min, max))| min + s * (max - min))
            .collect())
    }

    pub fn projection2state(&self, projection: &[f64]) -> Result<Vec<f64>, EnvError> {
        check_dims(N_PARAMETERS, projection.len())?;
        Ok(projection
            .iter()
            .zip(PROJECTION_MIN.iter().zip(&PROJECTION_MAX))
            .map(|(p, (min, max))| (p - min) / (max - min))
            .collect())
    }

    pub fn apply_projection_constraints(&self, projection: &[f64]) -> Vec<f64> {
        constrain(
            projection,
            &self.constraints.projection_tied,
            &self.constraints.projection_fixed
        )
    }

    pub fn apply_lattice_constraints(&self, lattice: &[f64]) -> Vec<f64> {
        constrain(
            lattice,
            &self.constraints.lattice_tied,
            &self.constraints.lattice_fixed
        )
    }

    /// `(a, b, c, alpha, beta, gamma)` of a projection vector.
    pub fn projection2lattice(&self, projection: &[f64]) -> Result<[f64; N_PARAMETERS], EnvError> {
        check_dims(N_PARAMETERS, projection.len())?;
        let s = projection
            .iter()
            .zip(&BASIS)
            .fold([[0.0; 3]; 3], |acc, (k, basis)| add(&acc, &scale(basis, *k)));
        let j = expm_symmetric(&scale(&s, 2.0));

        let a = j[0][0].sqrt();
        let b = j[1][1].sqrt();
        let c = j[2][2].sqrt();
        let angle = |cos: f64| cos.clamp(-1.0, 1.0).acos().to_degrees();
        Ok([
            a,
            b,
            c,
            angle(j[1][2] / (b * c)),
            angle(j[0][2] / (a * c)),
            angle(j[0][1] / (a * b))
        ])
    }

    /// Projection vector of a lattice; fails if the parameters do not
    /// describe a cell of positive volume.
    pub fn lattice2projection(&self, lattice: &[f64]) -> Result<Vec<f64>, EnvError> {
        check_dims(N_PARAMETERS, lattice.len())?;
        let (a, b, c) = (lattice[0], lattice[1], lattice[2]);
        let cos = |deg: f64| deg.to_radians().cos();
        let ab_cos_gamma = a * b * cos(lattice[5]);
        let ac_cos_beta = a * c * cos(lattice[4]);
        let bc_cos_alpha = b * c * cos(lattice[3]);

        let j = [
            [a * a, ab_cos_gamma, ac_cos_beta],
            [ab_cos_gamma, b * b, bc_cos_alpha],
            [ac_cos_beta, bc_cos_alpha, c * c]
        ];
        let s = logm_spd(&j)
            .map(|log| scale(&log, 0.5))
            .ok_or_else(|| EnvError::InvalidLattice {
                reason: format!("metric tensor of {lattice:?} is not positive definite")
            })?;

        let k1 = s[0][1];
        let k2 = s[0][2];
        let k3 = s[1][2];
        let k6 = (s[0][0] + s[1][1] + s[2][2]) / 3.0;
        let k5 = (s[0][0] + s[1][1]) / 2.0 - k6;
        let k4 = s[0][0] - (k5 + k6);
        Ok(vec![k1, k2, k3, k4, k5, k6])
    }

    /// Lattice parameters of a state, with all constraints applied.
    pub fn state2lattice(&self, state: &[f64]) -> Result<[f64; N_PARAMETERS], EnvError> {
        let projection = self.apply_projection_constraints(&self.state2projection(state)?);
        let lattice = self.projection2lattice(&projection)?;
        let constrained = self.apply_lattice_constraints(&lattice);
        let mut out = [0.0; N_PARAMETERS];
        out.copy_from_slice(&constrained);
        Ok(out)
    }

    pub fn parameters2state(&self, parameters: &[f64]) -> Result<Vec<f64>, EnvError> {
        let projection = self.lattice2projection(parameters)?;
        self.projection2state(&projection)
    }
}

impl Environment for LatticeParametersSgccg {
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
        if valid && !self.cube.is_source(self.cube.state()) {
            let projection = self.state2projection(self.cube.state())?;
            let state = self.projection2state(&self.apply_projection_constraints(&projection))?;
            self.cube.set_state_unchecked(state);
        }
        Ok(valid)
    }

    fn step_eos(&mut self, backward: bool) -> bool {
        self.cube.step_eos(backward)
    }

    fn is_valid(&self, state: &[f64]) -> bool {
        let Ok(projection) = self.state2projection(state) else {
            return false;
        };
        projection
            .iter()
            .zip(PROJECTION_MIN.iter().zip(&PROJECTION_MAX))
            .all(|(p, (min, max))| (*min..=*max).contains(p))
    }

    /// Lattice parameters (lengths then angles) per state.
    fn states2proxy(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EnvError> {
        states
            .iter()
            .map(|state| self.state2lattice(state).map(|lattice| lattice.to_vec()))
            .collect()
    }

    fn state2readable(&self, state: &[f64]) -> Result<String, EnvError> {
        let [a, b, c, alpha, beta, gamma] = self.state2lattice(state)?;
        Ok(format!(
            "({a:?}, {b:?}, {c:?}), ({alpha:?}, {beta:?}, {gamma:?})"
        ))
    }

    fn readable2state(&self, readable: &str) -> Result<Vec<f64>, EnvError> {
        let values = parse_floats(readable, ',')?;
        self.parameters2state(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(system: LatticeSystem) -> LatticeParametersSgccg {
        LatticeParametersSgccg::new(system).unwrap()
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_state_projection_round_trip() {
        let env = env(LatticeSystem::Triclinic);
        let state = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let projection = env.state2projection(&state).unwrap();
        assert_close(&projection[..1], &[-1.2], 1e-12);
        assert_close(&env.projection2state(&projection).unwrap(), &state, 1e-12);
    }

    #[test]
    fn test_cubic_lattice_to_projection() {
        let env = env(LatticeSystem::Cubic);
        let projection = env
            .lattice2projection(&[4.0, 4.0, 4.0, 90.0, 90.0, 90.0])
            .unwrap();
        assert_close(&projection, &[0.0, 0.0, 0.0, 0.0, 0.0, 4.0f64.ln()], 1e-10);
    }

    #[test]
    fn test_lattice_round_trip() {
        let env = env(LatticeSystem::Triclinic);
        let lattice = [3.0, 4.5, 6.0, 80.0, 100.0, 110.0];
        let projection = env.lattice2projection(&lattice).unwrap();
        let back = env.projection2lattice(&projection).unwrap();
        assert_close(&back, &lattice, 1e-8);
    }

    #[test]
    fn test_hexagonal_fixed_projection_gives_120_degrees() {
        let env = env(LatticeSystem::Hexagonal);
        let projection = env.apply_projection_constraints(&[0.9, 0.9, 0.9, 0.9, 0.4, 1.0]);
        let lattice = env.projection2lattice(&projection).unwrap();
        assert_close(&lattice[3..], &[90.0, 90.0, 120.0], 1e-8);
        assert!((lattice[0] - lattice[1]).abs() < 1e-10);
    }

    #[test]
    fn test_degenerate_lattice_rejected() {
        let env = env(LatticeSystem::Triclinic);
        let err = env
            .lattice2projection(&[1.0, 1.0, 1.0, 10.0, 10.0, 170.0])
            .unwrap_err();
        assert!(matches!(err, EnvError::InvalidLattice { .. }));
    }

    #[test]
    fn test_step_applies_projection_constraints() {
        let mut env = env(LatticeSystem::Rhombohedral);
        assert!(env.step(&Action::new(vec![0.7, 0.2, 0.9, 0.1, 0.1, 0.5]), false).unwrap());
        let projection = env.state2projection(env.state()).unwrap();
        assert!((projection[1] - projection[0]).abs() < 1e-12);
        assert!((projection[2] - projection[0]).abs() < 1e-12);
        assert!(projection[3].abs() < 1e-12);
        assert!(projection[4].abs() < 1e-12);
        assert!(env.is_valid(env.state()));

        let lattice = env.state2lattice(env.state()).unwrap();
        assert_eq!(lattice[0], lattice[1]);
        assert_eq!(lattice[3], lattice[5]);
    }

    #[test]
    fn test_backward_to_source_is_not_constrained() {
        let mut env = env(LatticeSystem::Cubic);
        env.step(&Action::new(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.5]), false).unwrap();
        assert!(env.step(&Action::to_source(6), true).unwrap());
        assert!(env.is_source(env.state()));
    }

    #[test]
    fn test_readable_round_trip() {
        let env = env(LatticeSystem::Triclinic);
        let state = env
            .parameters2state(&[5.0, 6.0, 7.0, 85.0, 95.0, 105.0])
            .unwrap();
        let readable = env.state2readable(&state).unwrap();
        let back = env.readable2state(&readable).unwrap();
        assert_close(&back, &state, 1e-8);
    }

    #[test]
    fn test_is_valid_bounds() {
        let env = env(LatticeSystem::Triclinic);
        assert!(env.is_valid(&[0.5; 6]));
        assert!(!env.is_valid(&[0.5, 0.5, 0.5, 0.5, 0.5, 1.2]));
        assert!(!env.is_valid(&[0.5; 5]));
    }

    #[test]
    fn test_set_lattice_system() {
        let mut env = env(LatticeSystem::Triclinic);
        env.set_lattice_system(LatticeSystem::Monoclinic).unwrap();
        assert_eq!(env.ignored_dims(), &[true, false, true, false, false, false]);
    }
}
