/*!
# Model Collaborators

The sampler treats the statistical model as a set of opaque collaborators:
a [`Prior`] over parameter vectors, a [`Simulator`] producing synthetic
datasets, and a [`ProposalKernel`] generating MCMC moves. Implement these
for your model and hand them to [`crate::smc::Wsmc`]; concrete
implementations for common cases live in [`crate::distributions`].

All collaborators receive a caller-supplied [`SmallRng`] so that every
invocation uses an independent, reproducible random stream.
*/

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::SmallRng;

use crate::error::Result;

/// A prior distribution over parameter vectors θ.
pub trait Prior: Sync {
    /// Draws one parameter vector.
    fn sample(&self, rng: &mut SmallRng) -> Array1<f64>;

    /// Returns the log-density at `theta` (`-inf` outside the support).
    fn log_density(&self, theta: ArrayView1<f64>) -> f64;
}

/// A stochastic simulator mapping a parameter vector to a synthetic dataset
/// of the same shape class as the observations (dimension × count).
///
/// Called once per particle per move; failures are isolated per particle by
/// the sampler rather than aborting the run.
pub trait Simulator: Sync {
    /// Simulates one dataset for `theta`.
    fn simulate(&self, theta: ArrayView1<f64>, rng: &mut SmallRng) -> Result<Array2<f64>>;
}

/// A mutation mechanism for particle populations.
///
/// [`ProposalKernel::fit`] is called once per mutation round with the
/// current population (particles × dim) before any proposals are drawn;
/// [`ProposalKernel::log_density`] feeds the Metropolis acceptance ratio.
pub trait ProposalKernel: Sync {
    /// Adapts the kernel to the current population.
    fn fit(&mut self, thetas: ArrayView2<f64>);

    /// Proposes a new parameter vector given the current one.
    fn propose(&self, theta: ArrayView1<f64>, rng: &mut SmallRng) -> Array1<f64>;

    /// Log-density of proposing `to` from `from`.
    fn log_density(&self, from: ArrayView1<f64>, to: ArrayView1<f64>) -> f64;
}
