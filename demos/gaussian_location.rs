use ndarray::arr1;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Duration;
use wsmc::distance::HilbertDistance;
use wsmc::distributions::{AdaptiveGaussianKernel, GaussianPrior, GaussianSimulator};
use wsmc::model::Simulator;
use wsmc::smc::{Wsmc, WsmcConfig};

fn main() {
    // Observed data from a 2D Gaussian location model at theta = (1.5, -0.5).
    let simulator = GaussianSimulator { nobs: 100 };
    let truth = arr1(&[1.5, -0.5]);
    let observed = simulator
        .simulate(truth.view(), &mut SmallRng::seed_from_u64(0))
        .unwrap();

    let mut sampler = Wsmc::new(
        GaussianPrior {
            mean: arr1(&[0.0, 0.0]),
            std: arr1(&[5.0, 5.0]),
        },
        simulator,
        AdaptiveGaussianKernel::default(),
        HilbertDistance { p: 1.0, ground_p: 2.0 },
        observed,
        WsmcConfig::new(512).set_seed(42),
    );

    // Run for up to 10 seconds with a progress spinner
    let run = sampler.run_with_progress(Duration::from_secs(10)).unwrap();

    let latest = run.latest().unwrap();
    let mean = latest.thetas.mean_axis(ndarray::Axis(0)).unwrap();
    println!(
        "{} generations in {:.1?}, final tolerance {:.4}",
        run.generations.len(),
        run.elapsed,
        latest.tolerance
    );
    println!("posterior mean: {mean:.3} (truth: {truth:.3})");

    assert!((mean[0] - truth[0]).abs() < 1.0);
    assert!((mean[1] - truth[1]).abs() < 1.0);
}
