//! Quantile and resampling primitives for the population sampler.

use ndarray::Array1;
use ndarray_stats::interpolate::Linear;
use ndarray_stats::Quantile1dExt;
use noisy_float::types::{n64, N64};
use rand::rngs::SmallRng;
use rand::Rng;

/// Resampling scheme used to restore the population to its fixed size.
///
/// Both schemes are reproducible given a fixed random seed; stratified
/// resampling has lower variance and is the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resampling {
    /// n independent draws from the weight distribution.
    Multinomial,
    /// One uniform draw per equal-width stratum of [0, 1).
    Stratified,
}

/// Linear-interpolation quantile of an unsorted slice.
///
/// `q` is clamped to [0, 1]. Panics on an empty slice or on non-finite
/// values; callers filter those out first.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    assert!(!values.is_empty(), "quantile of empty slice");
    let mut data: Array1<N64> = values.iter().map(|&v| n64(v)).collect();
    data.quantile_mut(n64(q.clamp(0.0, 1.0)), &Linear)
        .expect("input is non-empty and the quantile is in range")
        .raw()
}

/// Draws `n` indices from the categorical distribution given by `weights`
/// (need not be normalized) using the requested scheme.
pub fn resample_indices(
    weights: &[f64],
    n: usize,
    scheme: Resampling,
    rng: &mut SmallRng,
) -> Vec<usize> {
    debug_assert!(!weights.is_empty());
    let total: f64 = weights.iter().sum();
    debug_assert!(total > 0.0, "resampling requires positive total weight");

    let mut cumulative = Vec::with_capacity(weights.len());
    let mut acc = 0.0;
    for &w in weights {
        acc += w / total;
        cumulative.push(acc);
    }
    // Guard against rounding keeping the last bucket short of 1.
    if let Some(last) = cumulative.last_mut() {
        *last = 1.0;
    }

    let pick = |u: f64| -> usize {
        cumulative
            .partition_point(|&c| c < u)
            .min(cumulative.len() - 1)
    };

    (0..n)
        .map(|k| {
            let u = match scheme {
                Resampling::Multinomial => rng.gen::<f64>(),
                Resampling::Stratified => (k as f64 + rng.gen::<f64>()) / n as f64,
            };
            pick(u)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    #[test]
    fn quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_abs_diff_eq!(quantile(&values, 0.0), 1.0);
        assert_abs_diff_eq!(quantile(&values, 0.5), 2.5);
        assert_abs_diff_eq!(quantile(&values, 1.0), 4.0);
    }

    #[test]
    fn quantile_of_singleton() {
        assert_abs_diff_eq!(quantile(&[7.0], 0.3), 7.0);
    }

    #[test]
    fn resampling_is_reproducible() {
        let weights = [0.2, 0.5, 0.3];
        for scheme in [Resampling::Multinomial, Resampling::Stratified] {
            let a = resample_indices(&weights, 50, scheme, &mut SmallRng::seed_from_u64(11));
            let b = resample_indices(&weights, 50, scheme, &mut SmallRng::seed_from_u64(11));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn resampling_respects_weights() {
        let weights = [0.0, 1.0, 0.0];
        let mut rng = SmallRng::seed_from_u64(2);
        let idx = resample_indices(&weights, 100, Resampling::Stratified, &mut rng);
        assert!(idx.iter().all(|&i| i == 1));
    }

    #[test]
    fn stratified_counts_track_weights_closely() {
        let weights = [0.25, 0.25, 0.5];
        let mut rng = SmallRng::seed_from_u64(3);
        let idx = resample_indices(&weights, 1000, Resampling::Stratified, &mut rng);
        let mut counts = [0usize; 3];
        for i in idx {
            counts[i] += 1;
        }
        // Stratified draws land within one stratum of the expected counts.
        assert!((counts[0] as i64 - 250).abs() <= 2);
        assert!((counts[1] as i64 - 250).abs() <= 2);
        assert!((counts[2] as i64 - 500).abs() <= 2);
    }

    #[test]
    fn requested_count_is_exact() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let mut rng = SmallRng::seed_from_u64(4);
        let idx = resample_indices(&weights, 37, Resampling::Multinomial, &mut rng);
        assert_eq!(idx.len(), 37);
        assert!(idx.iter().all(|&i| i < 4));
    }
}
