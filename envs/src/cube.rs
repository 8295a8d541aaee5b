//! Continuous hyper cube.
//!
//! States live in `[0, 1]^n_dim`; the source state sits outside the cube at
//! `-1` on every dimension. The first forward action places the state inside
//! the cube (its increments are absolute positions), later actions move it by
//! their increments. Dimensions flagged as ignored never move.

use crate::{Action, Environment, check_dims, parse_floats};
use errors::EnvError;

pub const SOURCE_VALUE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousCube {
    n_dim: usize,
    ignored_dims: Vec<bool>,
    source: Vec<f64>,
    state: Vec<f64>,
    done: bool
}

impl ContinuousCube {
    pub fn new(n_dim: usize) -> Result<Self, EnvError> {
        if n_dim == 0 {
            return Err(EnvError::InvalidConfig {
                reason: "n_dim must be at least 1".to_string()
            });
        }
        let source = vec![SOURCE_VALUE; n_dim];
        Ok(Self {
            n_dim,
            ignored_dims: vec![false; n_dim],
            state: source.clone(),
            source,
            done: false
        })
    }

    pub fn with_ignored_dims(mut self, ignored_dims: Vec<bool>) -> Result<Self, EnvError> {
        self.set_ignored_dims(ignored_dims)?;
        Ok(self)
    }

    pub fn set_ignored_dims(&mut self, ignored_dims: Vec<bool>) -> Result<(), EnvError> {
        check_dims(self.n_dim, ignored_dims.len())?;
        self.ignored_dims = ignored_dims;
        Ok(())
    }

    pub fn ignored_dims(&self) -> &[bool] {
        &self.ignored_dims
    }

    /// State reached from `state` by `action`, or `None` if the action is
    /// not allowed there.
    pub fn transition(
        &self,
        state: &[f64],
        action: &Action,
        backward: bool
    ) -> Result<Option<Vec<f64>>, EnvError> {
        check_dims(self.n_dim, action.increments.len())?;
        check_dims(self.n_dim, state.len())?;
        let at_source = self.is_source(state);

        let next = if backward {
            if at_source {
                return Ok(None);
            }
            if action.to_source {
                return Ok(Some(self.source.clone()));
            }
            self.moved(state, &action.increments, -1.0)
        } else {
            if action.to_source {
                return Ok(None);
            }
            if at_source {
                action
                    .increments
                    .iter()
                    .zip(&self.ignored_dims)
                    .map(|(inc, ignored)| if *ignored { 0.0 } else { *inc })
                    .collect()
            } else {
                self.moved(state, &action.increments, 1.0)
            }
        };

        Ok(self.within_bounds(&next).then_some(next))
    }

    fn moved(&self, state: &[f64], increments: &[f64], sign: f64) -> Vec<f64> {
        state
            .iter()
            .zip(increments)
            .zip(&self.ignored_dims)
            .map(|((s, inc), ignored)| if *ignored { *s } else { s + sign * inc })
            .collect()
    }

    fn within_bounds(&self, state: &[f64]) -> bool {
        state
            .iter()
            .zip(&self.ignored_dims)
            .all(|(s, ignored)| *ignored || (0.0..=1.0).contains(s))
    }

    pub(crate) fn set_state_unchecked(&mut self, state: Vec<f64>) {
        self.state = state;
    }
}

impl Environment for ContinuousCube {
    fn n_dim(&self) -> usize {
        self.n_dim
    }

    fn source(&self) -> &[f64] {
        &self.source
    }

    fn state(&self) -> &[f64] {
        &self.state
    }

    fn done(&self) -> bool {
        self.done
    }

    fn reset(&mut self) {
        self.state = self.source.clone();
        self.done = false;
    }

    fn set_state(&mut self, state: Vec<f64>, done: bool) -> Result<(), EnvError> {
        check_dims(self.n_dim, state.len())?;
        self.state = state;
        self.done = done;
        Ok(())
    }

    fn step(&mut self, action: &Action, backward: bool) -> Result<bool, EnvError> {
        if self.done {
            return Ok(false);
        }
        match self.transition(&self.state, action, backward)? {
            Some(next) => {
                self.state = next;
                Ok(true)
            }
            None => Ok(false)
        }
    }

    fn step_eos(&mut self, backward: bool) -> bool {
        if backward {
            let valid = self.done;
            self.done = false;
            return valid;
        }
        if self.done || self.is_source(&self.state) {
            return false;
        }
        self.done = true;
        true
    }

    fn is_valid(&self, state: &[f64]) -> bool {
        state.len() == self.n_dim && self.within_bounds(state)
    }

    /// Maps `[0, 1]` to `[-1, 1]`.
    fn states2proxy(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EnvError> {
        states
            .iter()
            .map(|state| {
                check_dims(self.n_dim, state.len())?;
                Ok(state.iter().map(|s| 2.0 * s - 1.0).collect())
            })
            .collect()
    }

    fn state2readable(&self, state: &[f64]) -> Result<String, EnvError> {
        check_dims(self.n_dim, state.len())?;
        let values: Vec<String> = state.iter().map(|s| format!("{s:?}")).collect();
        Ok(format!("[{}]", values.join(" ")))
    }

    fn readable2state(&self, readable: &str) -> Result<Vec<f64>, EnvError> {
        let state = parse_floats(readable, ' ')?;
        check_dims(self.n_dim, state.len())?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_dims_rejected() {
        assert!(ContinuousCube::new(0).is_err());
    }

    #[test]
    fn test_forward_from_source_sets_increments() {
        let mut env = ContinuousCube::new(3)
            .unwrap()
            .with_ignored_dims(vec![false, true, false])
            .unwrap();
        assert!(env.step(&Action::new(vec![0.2, 0.7, 0.4]), false).unwrap());
        assert_eq!(env.state(), &[0.2, 0.0, 0.4]);

        assert!(env.step(&Action::new(vec![0.1, 0.5, 0.1]), false).unwrap());
        assert_eq!(env.state()[1], 0.0);
        assert!((env.state()[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_bounds_step_is_invalid() {
        let mut env = ContinuousCube::new(2).unwrap();
        env.step(&Action::new(vec![0.9, 0.5]), false).unwrap();
        let before = env.state().to_vec();

        assert!(!env.step(&Action::new(vec![0.2, 0.0]), false).unwrap());
        assert_eq!(env.state(), before.as_slice());
    }

    #[test]
    fn test_backward_to_source() {
        let mut env = ContinuousCube::new(2).unwrap();
        assert!(!env.step(&Action::to_source(2), true).unwrap());

        env.step(&Action::new(vec![0.3, 0.3]), false).unwrap();
        assert!(env.step(&Action::to_source(2), true).unwrap());
        assert!(env.is_source(env.state()));
    }

    #[test]
    fn test_backward_subtracts_increments() {
        let mut env = ContinuousCube::new(2).unwrap();
        env.step(&Action::new(vec![0.5, 0.5]), false).unwrap();
        env.step(&Action::new(vec![0.25, 0.0]), false).unwrap();
        assert!(env.step(&Action::new(vec![0.25, 0.0]), true).unwrap());
        assert_eq!(env.state(), &[0.5, 0.5]);
    }

    #[test]
    fn test_eos() {
        let mut env = ContinuousCube::new(2).unwrap();
        assert!(!env.step_eos(false));

        env.step(&Action::new(vec![0.5, 0.5]), false).unwrap();
        assert!(env.step_eos(false));
        assert!(env.done());
        assert!(!env.step(&Action::new(vec![0.1, 0.1]), false).unwrap());

        assert!(env.step_eos(true));
        assert!(!env.done());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut env = ContinuousCube::new(2).unwrap();
        assert!(matches!(
            env.step(&Action::new(vec![0.1]), false),
            Err(EnvError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_states2proxy_and_readable() {
        let env = ContinuousCube::new(2).unwrap();
        assert_eq!(
            env.states2proxy(&[vec![0.0, 1.0], vec![0.5, 0.25]]).unwrap(),
            vec![vec![-1.0, 1.0], vec![0.0, -0.5]]
        );
        assert_eq!(env.state2readable(&[0.5, 0.25]).unwrap(), "[0.5 0.25]");
        assert_eq!(env.readable2state("[0.5 0.25]").unwrap(), vec![0.5, 0.25]);
        assert!(env.readable2state("[0.5]").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_steps_stay_in_cube(
            start in proptest::collection::vec(0.0f64..=1.0, 3),
            steps in proptest::collection::vec(proptest::collection::vec(-0.5f64..0.5, 3), 1..10),
        ) {
            let mut env = ContinuousCube::new(3).unwrap();
            prop_assert!(env.step(&Action::new(start), false).unwrap());
            for increments in steps {
                let backward = increments[0] < 0.0;
                let _ = env.step(&Action::new(increments), backward).unwrap();
                prop_assert!(env.is_valid(env.state()));
            }
        }
    }
}
