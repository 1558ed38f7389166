/*!
# Distance Backends

The sampler is agnostic to how a simulated dataset is compared to the
observed one: it only sees the [`DistanceMetric`] capability
`(observed, simulated) -> scalar`. The three transport backends are wrapped
here as strategy objects, and any `Fn` closure with the right signature works
too.

# Examples

```rust
use ndarray::arr2;
use wsmc::distance::{DistanceMetric, HilbertDistance};

let metric = HilbertDistance { p: 1.0, ground_p: 2.0 };
let observed = arr2(&[[0.0, 1.0, 2.0]]);
let simulated = arr2(&[[0.1, 1.1, 2.1]]);
let d = metric.distance(observed.view(), simulated.view()).unwrap();
assert!(d > 0.0);
```
*/

use ndarray::ArrayView2;

use crate::error::Result;
use crate::exact::wasserstein;
use crate::hilbert::hilbert_distance;
use crate::sinkhorn::sinkhorn_uniform;

/// Capability to score a simulated dataset against the observed one.
///
/// Implementations must be pure with respect to their inputs and `Sync`,
/// since the sampler evaluates particles from a rayon worker pool.
pub trait DistanceMetric: Sync {
    /// Returns a non-negative scalar distance between the two datasets.
    fn distance(&self, observed: ArrayView2<f64>, simulated: ArrayView2<f64>) -> Result<f64>;
}

impl<F> DistanceMetric for F
where
    F: Fn(ArrayView2<f64>, ArrayView2<f64>) -> Result<f64> + Sync,
{
    fn distance(&self, observed: ArrayView2<f64>, simulated: ArrayView2<f64>) -> Result<f64> {
        self(observed, simulated)
    }
}

/// Exact p-Wasserstein distance with uniform weights (the correctness
/// baseline; expensive for large datasets).
#[derive(Clone, Copy, Debug)]
pub struct ExactDistance {
    /// Wasserstein exponent.
    pub p: f64,
}

impl DistanceMetric for ExactDistance {
    fn distance(&self, observed: ArrayView2<f64>, simulated: ArrayView2<f64>) -> Result<f64> {
        wasserstein(observed, simulated, self.p)
    }
}

/// Entropy-regularized distance; `corrected` selects the bias-corrected
/// value instead of the raw regularized cost.
#[derive(Clone, Copy, Debug)]
pub struct SinkhornDistance {
    /// Wasserstein exponent.
    pub p: f64,
    /// Regularization strength.
    pub eps: f64,
    /// Fixed Sinkhorn iteration budget.
    pub niterations: usize,
    /// Whether to report the bias-corrected value.
    pub corrected: bool,
}

impl DistanceMetric for SinkhornDistance {
    fn distance(&self, observed: ArrayView2<f64>, simulated: ArrayView2<f64>) -> Result<f64> {
        let out = sinkhorn_uniform(observed, simulated, self.p, self.eps, self.niterations)?;
        Ok(if self.corrected {
            out.corrected
        } else {
            out.distance
        })
    }
}

/// Hilbert-curve rank-pairing distance, the O(N log N) default for large
/// datasets.
#[derive(Clone, Copy, Debug)]
pub struct HilbertDistance {
    /// Averaging exponent.
    pub p: f64,
    /// Pointwise ground-distance exponent (2 for Euclidean).
    pub ground_p: f64,
}

impl DistanceMetric for HilbertDistance {
    fn distance(&self, observed: ArrayView2<f64>, simulated: ArrayView2<f64>) -> Result<f64> {
        hilbert_distance(observed, simulated, self.p, self.ground_p)
    }
}
