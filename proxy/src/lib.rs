//! # Proxies
//!
//! Reward functions evaluated on batches of environment states, after the
//! environment has converted them with `states2proxy`.

pub mod build;
pub mod corners;

pub use build::build_proxy;
pub use corners::Corners;

use errors::ProxyError;

pub trait Proxy: std::fmt::Debug + Send {
    /// Fix the dimensionality of the states to evaluate.
    fn setup(&mut self, n_dim: usize);

    /// One reward per state.
    fn evaluate(&self, states: &[Vec<f64>]) -> Result<Vec<f64>, ProxyError>;

    /// Highest reward the proxy can return.
    fn optimum(&self) -> Result<f64, ProxyError>;
}
