//! Error taxonomy shared by the distance backends and the WSMC sampler.
//!
//! Structural errors (shapes, marginals) are always surfaced to the caller;
//! numeric errors are recovered where mathematically sound and surfaced as
//! [`Error::NumericalUnderflow`] otherwise.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when two point sets do not share the same dimensionality.
    #[error("dimension mismatch: first point set has {left} rows, second has {right}")]
    DimensionMismatch {
        /// Number of rows (coordinates) in the first point set.
        left: usize,
        /// Number of rows (coordinates) in the second point set.
        right: usize,
    },

    /// Returned when a point set has no points.
    #[error("empty point set: point sets must contain at least one column")]
    EmptyPointSet,

    /// Returned when weight vectors are malformed: wrong length, negative
    /// entries, or total masses that differ beyond numerical tolerance.
    #[error("infeasible marginals: {reason}")]
    InfeasibleMarginals {
        /// What made the marginals unusable.
        reason: String,
    },

    /// Returned when the transportation simplex exhausts its pivot budget
    /// without reaching optimality. Should not happen on well-conditioned
    /// inputs; indicates numerically pathological cost matrices.
    #[error("transportation simplex did not reach optimality within {pivots} pivots")]
    SimplexStalled {
        /// The exhausted pivot budget.
        pivots: usize,
    },

    /// Returned when all Sinkhorn scaling factors collapse to zero, which
    /// happens when `eps` is too small relative to the cost magnitudes.
    /// Recoverable: retry with a larger `eps` or more iterations.
    #[error("numerical underflow in Sinkhorn scaling (eps = {eps}); retry with larger eps")]
    NumericalUnderflow {
        /// The regularization strength that collapsed.
        eps: f64,
    },

    /// Returned when every particle in a generation fails to simulate or
    /// score. Fatal: the run cannot continue without any usable particle.
    #[error("degenerate population: all {nthetas} particles failed in generation {generation}")]
    DegeneratePopulation {
        /// Population size.
        nthetas: usize,
        /// Index of the generation in which the collapse happened.
        generation: usize,
    },

    /// Returned when a configuration value is outside its valid range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// The offending configuration field.
        name: &'static str,
        /// Why the value is rejected.
        reason: String,
    },

    /// Returned when a run handle is in a state the operation does not
    /// accept, e.g. extending a run that never produced a generation.
    #[error("invalid run state: {0}")]
    InvalidRunState(&'static str),

    /// Wraps a failure reported by a user-supplied simulator.
    #[error("simulation failed: {0}")]
    Simulation(String),

    /// Returned when writing a population export fails.
    #[cfg(feature = "csv")]
    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Helper for marginal validation failures.
    pub(crate) fn marginals(reason: impl Into<String>) -> Self {
        Error::InfeasibleMarginals {
            reason: reason.into(),
        }
    }
}
