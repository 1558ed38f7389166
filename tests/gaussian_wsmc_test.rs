//! End-to-end tests of the adaptive sampler on a Gaussian location model.
//!
//! The model simulates `nobs` draws from `N(theta, I)`; the observed dataset
//! comes from a known location, so the population should concentrate around
//! it as the tolerance shrinks. The tests drive the sampler step-by-step via
//! `extend` so none of them depend on wall-clock time.

use ndarray::arr1;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Duration;
use wsmc::distance::HilbertDistance;
use wsmc::distributions::{AdaptiveGaussianKernel, GaussianPrior, GaussianSimulator};
use wsmc::model::Simulator;
use wsmc::smc::{Wsmc, WsmcConfig, WsmcRun};

const TRUE_LOCATION: [f64; 2] = [1.5, -0.5];
const NOBS: usize = 100;

type GaussianSampler =
    Wsmc<GaussianPrior, GaussianSimulator, AdaptiveGaussianKernel, HilbertDistance>;

fn location_sampler(nthetas: usize, seed: u64) -> GaussianSampler {
    let simulator = GaussianSimulator { nobs: NOBS };
    let observed = simulator
        .simulate(
            arr1(&TRUE_LOCATION).view(),
            &mut SmallRng::seed_from_u64(999),
        )
        .unwrap();
    let prior = GaussianPrior {
        mean: arr1(&[0.0, 0.0]),
        std: arr1(&[5.0, 5.0]),
    };
    Wsmc::new(
        prior,
        simulator,
        AdaptiveGaussianKernel::default(),
        HilbertDistance {
            p: 1.0,
            ground_p: 2.0,
        },
        observed,
        WsmcConfig::new(nthetas).set_seed(seed),
    )
}

/// Runs initialization plus up to `steps` generations, time-independent.
fn run_steps(sampler: &mut GaussianSampler, steps: usize) -> WsmcRun {
    let initial = sampler.run(Duration::ZERO).unwrap();
    sampler.extend(initial, steps).unwrap()
}

#[test]
fn population_concentrates_around_the_true_location() {
    let mut sampler = location_sampler(256, 42);
    let run = run_steps(&mut sampler, 10);

    let last = run.latest().unwrap();
    let mean = last.thetas.mean_axis(ndarray::Axis(0)).unwrap();
    for (d, &truth) in TRUE_LOCATION.iter().enumerate() {
        assert!(
            (mean[d] - truth).abs() < 0.75,
            "dimension {d}: posterior mean {} too far from {truth}",
            mean[d]
        );
    }

    // The final population must be much tighter than the prior draw.
    assert!(last.tolerance < run.generations[0].tolerance / 2.0);
}

#[test]
fn tolerance_schedule_and_population_invariants_hold() {
    let mut sampler = location_sampler(64, 4242);
    let run = run_steps(&mut sampler, 6);

    assert!(run.generations.len() >= 2);
    let tolerances = run.tolerances();
    for pair in tolerances.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
    for generation in &run.generations {
        assert_eq!(generation.thetas.nrows(), 64);
        for &d in generation.distances.iter() {
            assert!(d.is_finite());
            assert!(d <= generation.tolerance + 1e-12);
        }
    }
}

#[test]
fn continuation_matches_an_uninterrupted_run() {
    let mut straight = location_sampler(64, 7);
    let full = run_steps(&mut straight, 4);

    let mut resumable = location_sampler(64, 7);
    let first_half = run_steps(&mut resumable, 2);
    let resumed = resumable.extend(first_half, 2).unwrap();

    assert_eq!(full.generations.len(), resumed.generations.len());
    for (a, b) in full.generations.iter().zip(resumed.generations.iter()) {
        assert_eq!(a.tolerance, b.tolerance);
        assert_eq!(a.thetas, b.thetas);
        assert_eq!(a.distances, b.distances);
    }
}

#[cfg(feature = "serde")]
#[test]
fn run_state_survives_a_serde_round_trip() {
    let mut sampler = location_sampler(32, 11);
    let run = run_steps(&mut sampler, 2);

    let json = serde_json::to_string(&run).unwrap();
    let restored: WsmcRun = serde_json::from_str(&json).unwrap();
    assert_eq!(run.tolerances(), restored.tolerances());

    // A restored handle extends exactly like the in-memory one.
    let mut twin = location_sampler(32, 11);
    let from_memory = sampler.extend(run, 2).unwrap();
    let from_disk = twin.extend(restored, 2).unwrap();
    for (a, b) in from_memory
        .generations
        .iter()
        .zip(from_disk.generations.iter())
    {
        assert_eq!(a.tolerance, b.tolerance);
        assert_eq!(a.thetas, b.thetas);
    }
}
