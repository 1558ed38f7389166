/*!
Concrete priors, simulators and proposal kernels for common models, plus the
small dense linear algebra (Cholesky) the adaptive kernel needs.

These are the batteries for the collaborator traits in [`crate::model`];
anything model-specific beyond a box prior or a Gaussian location model
belongs in user code.

# Examples

```rust
use ndarray::arr1;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use wsmc::distributions::UniformPrior;
use wsmc::model::Prior;

let prior = UniformPrior::new(arr1(&[-1.0, 0.0]), arr1(&[1.0, 2.0])).unwrap();
let mut rng = SmallRng::seed_from_u64(0);
let theta = prior.sample(&mut rng);
assert!(prior.log_density(theta.view()).is_finite());
```
*/

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_stats::CorrelationExt;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::model::{Prior, ProposalKernel, Simulator};

fn std_normal(rng: &mut SmallRng) -> f64 {
    <StandardNormal as Distribution<f64>>::sample(&StandardNormal, rng)
}

/// A box (independent-uniform) prior over a hyperrectangle.
#[derive(Clone, Debug)]
pub struct UniformPrior {
    low: Array1<f64>,
    high: Array1<f64>,
    log_volume: f64,
}

impl UniformPrior {
    /// Creates a box prior; every `low[i]` must be strictly below `high[i]`.
    pub fn new(low: Array1<f64>, high: Array1<f64>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(Error::DimensionMismatch {
                left: low.len(),
                right: high.len(),
            });
        }
        if low.iter().zip(high.iter()).any(|(&lo, &hi)| lo >= hi) {
            return Err(Error::InvalidParameter {
                name: "low/high",
                reason: "every lower bound must be below its upper bound".to_string(),
            });
        }
        let log_volume = low
            .iter()
            .zip(high.iter())
            .map(|(&lo, &hi)| (hi - lo).ln())
            .sum();
        Ok(Self {
            low,
            high,
            log_volume,
        })
    }
}

impl Prior for UniformPrior {
    fn sample(&self, rng: &mut SmallRng) -> Array1<f64> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(&lo, &hi)| rng.gen_range(lo..hi))
            .collect()
    }

    fn log_density(&self, theta: ArrayView1<f64>) -> f64 {
        let inside = theta
            .iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .all(|(&t, (&lo, &hi))| t >= lo && t <= hi);
        if inside {
            -self.log_volume
        } else {
            f64::NEG_INFINITY
        }
    }
}

/// Independent-Gaussian prior with per-coordinate mean and standard
/// deviation.
#[derive(Clone, Debug)]
pub struct GaussianPrior {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Prior for GaussianPrior {
    fn sample(&self, rng: &mut SmallRng) -> Array1<f64> {
        self.mean
            .iter()
            .zip(self.std.iter())
            .map(|(&mu, &sd)| mu + sd * std_normal(rng))
            .collect()
    }

    fn log_density(&self, theta: ArrayView1<f64>) -> f64 {
        theta
            .iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(&t, (&mu, &sd))| {
                let z = (t - mu) / sd;
                -0.5 * z * z - sd.ln() - 0.5 * (2.0 * PI).ln()
            })
            .sum()
    }
}

/// Gaussian location model: each dataset column is an independent draw from
/// `N(theta, I)`, with `nobs` columns per dataset. The workhorse simulator
/// of the integration tests.
#[derive(Clone, Copy, Debug)]
pub struct GaussianSimulator {
    /// Observations (columns) per simulated dataset.
    pub nobs: usize,
}

impl Simulator for GaussianSimulator {
    fn simulate(&self, theta: ArrayView1<f64>, rng: &mut SmallRng) -> Result<Array2<f64>> {
        let dim = theta.len();
        let mut data = Array2::<f64>::zeros((dim, self.nobs));
        for mut col in data.columns_mut() {
            for (d, slot) in col.iter_mut().enumerate() {
                *slot = theta[d] + std_normal(rng);
            }
        }
        Ok(data)
    }
}

/// Fixed-scale isotropic random-walk kernel; `fit` is a no-op.
#[derive(Clone, Debug)]
pub struct IsotropicKernel {
    pub std: f64,
}

impl ProposalKernel for IsotropicKernel {
    fn fit(&mut self, _thetas: ArrayView2<f64>) {}

    fn propose(&self, theta: ArrayView1<f64>, rng: &mut SmallRng) -> Array1<f64> {
        theta.iter().map(|&t| t + self.std * std_normal(rng)).collect()
    }

    fn log_density(&self, from: ArrayView1<f64>, to: ArrayView1<f64>) -> f64 {
        let var = self.std * self.std;
        from.iter()
            .zip(to.iter())
            .map(|(&f, &t)| {
                let diff = t - f;
                -0.5 * diff * diff / var - 0.5 * (2.0 * PI * var).ln()
            })
            .sum()
    }
}

/// Random-walk kernel with covariance `inflation` × the empirical population
/// covariance, refit at every mutation round. The standard generic choice
/// for ABC-SMC mutation.
#[derive(Clone, Debug)]
pub struct AdaptiveGaussianKernel {
    /// Covariance inflation factor (2.0 is the usual default).
    pub inflation: f64,
    chol: Option<Array2<f64>>,
    log_norm: f64,
}

impl AdaptiveGaussianKernel {
    pub fn new(inflation: f64) -> Self {
        Self {
            inflation,
            chol: None,
            log_norm: 0.0,
        }
    }

    fn chol(&self) -> &Array2<f64> {
        self.chol
            .as_ref()
            .expect("kernel must be fit before proposing")
    }
}

impl Default for AdaptiveGaussianKernel {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl ProposalKernel for AdaptiveGaussianKernel {
    fn fit(&mut self, thetas: ArrayView2<f64>) {
        let dim = thetas.ncols();
        // Variables are rows for `cov`, so transpose the particles × dim
        // population; ddof 1 gives the n - 1 divisor.
        let mut cov = if thetas.nrows() >= 2 {
            thetas
                .t()
                .cov(1.0)
                .unwrap_or_else(|_| Array2::zeros((dim, dim)))
        } else {
            Array2::zeros((dim, dim))
        };
        cov.mapv_inplace(|c| c * self.inflation);

        // Jitter the diagonal until the factorization goes through; a
        // collapsed population otherwise produces a singular covariance.
        let mut jitter = 1e-10;
        let chol = loop {
            if let Some(l) = cholesky(&cov) {
                break l;
            }
            for d in 0..dim {
                cov[[d, d]] += jitter;
            }
            jitter *= 10.0;
        };

        let log_det: f64 = (0..dim).map(|d| chol[[d, d]].ln()).sum();
        self.log_norm = -log_det - 0.5 * dim as f64 * (2.0 * PI).ln();
        self.chol = Some(chol);
    }

    fn propose(&self, theta: ArrayView1<f64>, rng: &mut SmallRng) -> Array1<f64> {
        let l = self.chol();
        let z: Array1<f64> = (0..theta.len()).map(|_| std_normal(rng)).collect();
        let step = l.dot(&z);
        &theta.to_owned() + &step
    }

    fn log_density(&self, from: ArrayView1<f64>, to: ArrayView1<f64>) -> f64 {
        let l = self.chol();
        let diff = &to.to_owned() - &from.to_owned();
        let y = forward_substitute(l, &diff);
        self.log_norm - 0.5 * y.iter().map(|v| v * v).sum::<f64>()
    }
}

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix,
/// or `None` if the matrix is not positive definite.
pub(crate) fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let dim = a.nrows();
    let mut l = Array2::<f64>::zeros((dim, dim));
    for i in 0..dim {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solves `L y = b` for lower-triangular `L`.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let dim = b.len();
    let mut y = Array1::<f64>::zeros(dim);
    for i in 0..dim {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}
