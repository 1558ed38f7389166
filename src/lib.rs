/*!
Likelihood-free Bayesian inference driven by optimal-transport distances.

The crate has two halves:

- **Distance backends** ([`exact`], [`sinkhorn`], [`hilbert`]) computing
  p-Wasserstein distances between weighted point sets, from the exact
  transportation simplex down to a linearithmic Hilbert-curve surrogate.
- **An adaptive SMC sampler** ([`smc`]) that targets the posterior of a
  simulator model by shrinking a tolerance on the distance between
  simulated and observed datasets, with no likelihood evaluations.

The [`model`] traits ([`model::Prior`], [`model::Simulator`],
[`model::ProposalKernel`]) and the [`distance::DistanceMetric`] trait are
the extension points; [`distributions`] ships ready-made implementations
for Gaussian and uniform building blocks.

# Feature flags

| Flag | What it enables | Default |
|------|----------------|---------|
| `serde` | `Serialize`/`Deserialize` on configs, runs and generations | off |
| `csv` | [`io::save_population_csv`] for exporting populations | off |
| `tracing` | Structured log events at generation boundaries | off |
*/

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod cost;
pub mod distance;
pub mod distributions;
mod error;
pub mod exact;
pub mod hilbert;
#[cfg(feature = "csv")]
pub mod io;
pub mod model;
pub mod sinkhorn;
pub mod smc;
pub mod stats;

pub use error::{Error, Result};
