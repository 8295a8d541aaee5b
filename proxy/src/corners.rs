//! Isotropic Gaussian bumps centred on the corners of the `[-1, 1]` box.

use crate::Proxy;
use errors::ProxyError;
use std::f64::consts::PI;

/// Reward `N exp(-1/2 (|x| - mu)^T (sigma I)^-1 (|x| - mu))`, the density of
/// a multivariate normal evaluated on absolute coordinates, so every corner
/// at distance `mu` from the origin on each axis is a mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Corners {
    n_dim: Option<usize>,
    mu: f64,
    sigma: f64
}

impl Corners {
    pub fn new(n_dim: Option<usize>, mu: f64, sigma: f64) -> Result<Self, ProxyError> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(ProxyError::InvalidConfig {
                reason: format!("sigma must be positive, got {sigma}")
            });
        }
        if !mu.is_finite() {
            return Err(ProxyError::InvalidConfig {
                reason: format!("mu must be finite, got {mu}")
            });
        }
        Ok(Self { n_dim, mu, sigma })
    }

    pub fn n_dim(&self) -> Option<usize> {
        self.n_dim
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    fn dims(&self) -> Result<usize, ProxyError> {
        self.n_dim.ok_or_else(|| ProxyError::NotSetUp {
            proxy: "Corners".to_string()
        })
    }

    /// `1 / sqrt((2 pi)^d det(sigma I))`.
    fn normalization(&self, n_dim: usize) -> f64 {
        let d = n_dim as f64;
        1.0 / ((2.0 * PI).powf(d) * self.sigma.powf(d)).sqrt()
    }

    fn reward(&self, state: &[f64], norm: f64) -> f64 {
        let squared: f64 = state
            .iter()
            .map(|x| {
                let delta = x.abs() - self.mu;
                delta * delta
            })
            .sum();
        norm * (-0.5 * squared / self.sigma).exp()
    }
}

impl Proxy for Corners {
    fn setup(&mut self, n_dim: usize) {
        self.n_dim = Some(n_dim);
    }

    fn evaluate(&self, states: &[Vec<f64>]) -> Result<Vec<f64>, ProxyError> {
        let n_dim = self.dims()?;
        let norm = self.normalization(n_dim);
        states
            .iter()
            .map(|state| {
                if state.len() != n_dim {
                    return Err(ProxyError::DimensionMismatch {
                        expected: n_dim,
                        actual: state.len()
                    });
                }
                Ok(self.reward(state, norm))
            })
            .collect()
    }

    fn optimum(&self) -> Result<f64, ProxyError> {
        let n_dim = self.dims()?;
        Ok(self.reward(&vec![self.mu; n_dim], self.normalization(n_dim)))
    }
}
