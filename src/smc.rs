/*!
# Adaptive Sequential Monte Carlo for Likelihood-Free Inference

[`Wsmc`] evolves a fixed-size particle population toward parameter regions
whose simulations are close to the observed dataset, under an adaptively
shrinking distance tolerance. Each generation:

1. picks a new tolerance as a quantile of the current distances,
2. discards particles beyond it and resamples back to full size,
3. mutates every particle with Metropolis moves restricted to the tolerance
   ball, re-simulating and re-scoring on every proposed move,
4. runs extra mutation rounds while the population diversity (fraction of
   particles that moved) stays below the configured floor.

Per-particle simulate-and-score work runs on a rayon worker pool; the
collected scores form the generation barrier before resampling. Every random
stream is derived from the base seed and the (generation, round, particle)
indices, so a run continued via [`Wsmc::extend`] reproduces an uninterrupted
run bit-for-bit.

# Examples

```rust,no_run
use ndarray::arr1;
use std::time::Duration;
use wsmc::distance::HilbertDistance;
use wsmc::distributions::{AdaptiveGaussianKernel, GaussianPrior, GaussianSimulator};
use wsmc::smc::{Wsmc, WsmcConfig};

let prior = GaussianPrior { mean: arr1(&[0.0]), std: arr1(&[5.0]) };
let simulator = GaussianSimulator { nobs: 100 };
let kernel = AdaptiveGaussianKernel::default();
let metric = HilbertDistance { p: 1.0, ground_p: 2.0 };

let observed = {
    use rand::{rngs::SmallRng, SeedableRng};
    use wsmc::model::Simulator;
    simulator.simulate(arr1(&[1.5]).view(), &mut SmallRng::seed_from_u64(0)).unwrap()
};

let config = WsmcConfig::new(256).set_seed(42);
let mut sampler = Wsmc::new(prior, simulator, kernel, metric, observed, config);
let run = sampler.run(Duration::from_secs(10)).unwrap();
println!("{} generations, final tolerance {}", run.generations.len(), run.latest().unwrap().tolerance);
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::model::{Prior, ProposalKernel, Simulator};
use crate::stats::{quantile, resample_indices, Resampling};

/// Stream tag for the resampling draw of a generation, distinct from any
/// mutation-round index.
const RESAMPLE_STREAM: u64 = u64::MAX;
/// Stream tag for prior draws during initialization.
const INIT_STREAM: u64 = u64::MAX - 1;

/// Configuration surface of the sampler. Fields mirror the recognized
/// options of the algorithm; all have serviceable defaults except the
/// population size.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WsmcConfig {
    /// Population size (constant across generations).
    pub nthetas: usize,
    /// Metropolis moves per particle per mutation round.
    pub nmoves: usize,
    /// Acceptance-fraction floor below which extra mutation rounds run.
    pub minimum_diversity: f64,
    /// Maximum number of extra mutation rounds per generation.
    pub r: usize,
    /// Hard cap on mutation attempts per particle per generation.
    pub maxtrials: usize,
    /// Quantile of current distances used as the next tolerance.
    pub quantile: f64,
    /// Quantile of the initial distances used as the starting tolerance
    /// (1.0 = maximum).
    pub initial_quantile: f64,
    /// The run converges once the tolerance reaches this floor.
    pub tolerance_target: f64,
    /// Resampling scheme restoring the population size.
    pub resampling: Resampling,
    /// Base seed all random streams derive from.
    pub seed: u64,
}

impl WsmcConfig {
    /// Creates a configuration with the given population size, defaults for
    /// everything else, and a seed drawn from the thread RNG.
    pub fn new(nthetas: usize) -> Self {
        Self {
            nthetas,
            nmoves: 2,
            minimum_diversity: 0.3,
            r: 2,
            maxtrials: 100,
            quantile: 0.5,
            initial_quantile: 1.0,
            tolerance_target: 0.0,
            resampling: Resampling::Stratified,
            seed: rand::thread_rng().gen(),
        }
    }

    /// Replaces the base seed (builder style, as all streams derive from it).
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.nthetas < 2 {
            return Err(Error::InvalidParameter {
                name: "nthetas",
                reason: format!("population needs at least 2 particles, got {}", self.nthetas),
            });
        }
        if self.nmoves == 0 {
            return Err(Error::InvalidParameter {
                name: "nmoves",
                reason: "at least one move per round is required".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.minimum_diversity) {
            return Err(Error::InvalidParameter {
                name: "minimum_diversity",
                reason: format!("must lie in [0, 1], got {}", self.minimum_diversity),
            });
        }
        for (name, q) in [("quantile", self.quantile), ("initial_quantile", self.initial_quantile)] {
            if !(q > 0.0 && q <= 1.0) {
                return Err(Error::InvalidParameter {
                    name,
                    reason: format!("must lie in (0, 1], got {q}"),
                });
            }
        }
        if self.maxtrials < self.nmoves {
            return Err(Error::InvalidParameter {
                name: "maxtrials",
                reason: format!(
                    "must allow at least one round of {} moves, got {}",
                    self.nmoves, self.maxtrials
                ),
            });
        }
        Ok(())
    }
}

/// Completion status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Mid-run; only observable inside the step loop.
    Ongoing,
    /// Tolerance reached its floor or stopped decreasing.
    Converged,
    /// The wall-clock or step budget ran out first; extendable.
    BudgetExhausted,
}

/// One accepted generation of the population.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generation {
    /// Particle parameter vectors, nthetas × dim.
    pub thetas: Array2<f64>,
    /// Distance to the observed dataset per particle; always finite, since
    /// failed particles are resampled away before a generation is recorded.
    pub distances: Array1<f64>,
    /// Tolerance every finite-distance particle satisfies.
    pub tolerance: f64,
    /// Accepted moves over proposed moves during mutation.
    pub acceptance_rate: f64,
    /// Fraction of particles whose value changed during mutation.
    pub diversity: f64,
    /// Simulation/scoring failures encountered while building this
    /// generation (isolated per particle, never fatal on their own).
    pub failures: usize,
}

/// The full state of a (possibly finished) run: an opaque, resumable
/// handle. Owned and mutated exclusively by the sampler.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WsmcRun {
    /// Snapshot of the configuration the run was produced with.
    pub config: WsmcConfig,
    /// Populations by generation index; index 0 is the prior draw.
    pub generations: Vec<Generation>,
    /// Compute time consumed so far, accumulated across continuations.
    pub elapsed: Duration,
    /// Completion status.
    pub status: Status,
}

impl WsmcRun {
    /// The most recent generation.
    pub fn latest(&self) -> Option<&Generation> {
        self.generations.last()
    }

    /// The tolerance schedule followed so far (non-increasing).
    pub fn tolerances(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.tolerance).collect()
    }
}

/// Phases of one generation step. Kept explicit so the transition logic
/// reads as the state machine it is, and continuation can only ever observe
/// whole generations.
enum Phase {
    Resampling,
    Mutating { round: usize },
    CheckingDiversity { round: usize },
    Advancing,
}

/// The adaptive SMC sampler. Generic over the prior, simulator, proposal
/// kernel and distance backend so that every collaborator stays opaque.
pub struct Wsmc<P, S, K, D> {
    prior: P,
    simulator: S,
    kernel: K,
    distance: D,
    observed: Array2<f64>,
    config: WsmcConfig,
}

/// Scratch carried between phases of one generation step.
struct StepState {
    thetas: Array2<f64>,
    distances: Array1<f64>,
    tolerance: f64,
    changed: Vec<bool>,
    accepted_moves: usize,
    proposed_moves: usize,
    failures: usize,
}

impl<P, S, K, D> Wsmc<P, S, K, D>
where
    P: Prior,
    S: Simulator,
    K: ProposalKernel,
    D: DistanceMetric,
{
    /// Creates a sampler for the given observed dataset (dimension × count).
    pub fn new(
        prior: P,
        simulator: S,
        kernel: K,
        distance: D,
        observed: Array2<f64>,
        config: WsmcConfig,
    ) -> Self {
        Self {
            prior,
            simulator,
            kernel,
            distance,
            observed,
            config,
        }
    }

    /// The configuration this sampler runs with.
    pub fn config(&self) -> &WsmcConfig {
        &self.config
    }

    /// Runs the sampler until the tolerance converges or `maxtime` elapses.
    ///
    /// The budget is checked at generation boundaries only: a generation
    /// that has started always completes. A budget-exhausted run can be
    /// resumed with [`Wsmc::extend`].
    pub fn run(&mut self, maxtime: Duration) -> Result<WsmcRun> {
        self.run_inner(maxtime, None)
    }

    /// Like [`Wsmc::run`], with an indicatif progress line per generation.
    pub fn run_with_progress(&mut self, maxtime: Duration) -> Result<WsmcRun> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {msg}")
                .expect("static template is well-formed"),
        );
        let run = self.run_inner(maxtime, Some(&pb))?;
        pb.finish_with_message(format!(
            "done: {} generations, status {:?}",
            run.generations.len(),
            run.status
        ));
        Ok(run)
    }

    /// Resumes a budget-exhausted run for up to `maxstep` further
    /// generations.
    ///
    /// Takes ownership of the previous run state and extends its lineage;
    /// the produced generations are identical to what an uninterrupted run
    /// with a larger budget would have produced.
    pub fn extend(&mut self, mut run: WsmcRun, maxstep: usize) -> Result<WsmcRun> {
        self.config.validate()?;
        if run.generations.is_empty() {
            return Err(Error::InvalidRunState("run has no generations to extend"));
        }
        if run.status == Status::Converged {
            return Err(Error::InvalidRunState("converged run cannot be extended"));
        }
        let start = Instant::now();
        let base = run.elapsed;
        run.status = Status::Ongoing;
        for _ in 0..maxstep {
            self.step_generation(&mut run)?;
            run.elapsed = base + start.elapsed();
            if run.status != Status::Ongoing {
                break;
            }
        }
        if run.status == Status::Ongoing {
            run.status = Status::BudgetExhausted;
        }
        Ok(run)
    }

    fn run_inner(&mut self, maxtime: Duration, progress: Option<&ProgressBar>) -> Result<WsmcRun> {
        self.config.validate()?;
        let start = Instant::now();
        let mut run = WsmcRun {
            config: self.config.clone(),
            generations: Vec::new(),
            elapsed: Duration::ZERO,
            status: Status::Ongoing,
        };

        self.initialize(&mut run)?;
        self.report(progress, &run);

        loop {
            run.elapsed = start.elapsed();
            if run.status != Status::Ongoing {
                break;
            }
            if run.elapsed >= maxtime {
                run.status = Status::BudgetExhausted;
                break;
            }
            self.step_generation(&mut run)?;
            self.report(progress, &run);
        }
        run.elapsed = start.elapsed();
        Ok(run)
    }

    fn report(&self, progress: Option<&ProgressBar>, run: &WsmcRun) {
        if let (Some(pb), Some(generation)) = (progress, run.latest()) {
            pb.set_message(format!(
                "generation {} | tolerance {:.6} | diversity {:.2} | acceptance {:.2}",
                run.generations.len() - 1,
                generation.tolerance,
                generation.diversity,
                generation.acceptance_rate,
            ));
            pb.tick();
        }
    }

    /// Initializing → Simulating → Scoring: draws the population from the
    /// prior and scores it against the observations.
    fn initialize(&mut self, run: &mut WsmcRun) -> Result<()> {
        let n = self.config.nthetas;
        let seed = self.config.seed;
        let observed = self.observed.view();

        let scored: Vec<(Array1<f64>, f64)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut rng = SmallRng::seed_from_u64(stream_seed(seed, 0, INIT_STREAM, i as u64));
                let theta = self.prior.sample(&mut rng);
                let distance = match self
                    .simulator
                    .simulate(theta.view(), &mut rng)
                    .and_then(|data| self.distance.distance(observed, data.view()))
                {
                    Ok(d) => d,
                    Err(_e) => {
                        trace_debug!("particle {i} failed to simulate/score at initialization");
                        f64::INFINITY
                    }
                };
                (theta, distance)
            })
            .collect();

        let dim = scored[0].0.len();
        let mut thetas = Array2::<f64>::zeros((n, dim));
        let mut distances = Array1::<f64>::zeros(n);
        for (i, (theta, distance)) in scored.into_iter().enumerate() {
            thetas.row_mut(i).assign(&theta);
            distances[i] = distance;
        }

        let finite: Vec<f64> = distances.iter().copied().filter(|d| d.is_finite()).collect();
        let failures = n - finite.len();
        if finite.is_empty() {
            return Err(Error::DegeneratePopulation {
                nthetas: n,
                generation: 0,
            });
        }
        let tolerance = quantile(&finite, self.config.initial_quantile);

        // With an initial quantile below the maximum some particles start
        // beyond the tolerance; resample immediately so the population
        // invariant holds from generation 0 on.
        if self.config.initial_quantile < 1.0 || failures > 0 {
            let survivors: Vec<usize> = distances
                .iter()
                .enumerate()
                .filter(|(_, &d)| d <= tolerance)
                .map(|(i, _)| i)
                .collect();
            let mut rng =
                SmallRng::seed_from_u64(stream_seed(seed, 0, RESAMPLE_STREAM, 0));
            let picks = resample_indices(
                &vec![1.0; survivors.len()],
                n,
                self.config.resampling,
                &mut rng,
            );
            let (old_thetas, old_distances) = (thetas.clone(), distances.clone());
            for (row, &pick) in picks.iter().enumerate() {
                let src = survivors[pick];
                thetas.row_mut(row).assign(&old_thetas.row(src));
                distances[row] = old_distances[src];
            }
        }

        trace_info!(
            "initialized population: {} particles, {} failures, tolerance {}",
            n,
            failures,
            tolerance
        );
        run.generations.push(Generation {
            thetas,
            distances,
            tolerance,
            acceptance_rate: 0.0,
            diversity: 0.0,
            failures,
        });
        Ok(())
    }

    /// One full generation: Resampling → Mutating ⇄ CheckingDiversity →
    /// Advancing, driven as an explicit state machine.
    fn step_generation(&mut self, run: &mut WsmcRun) -> Result<()> {
        let generation = run.generations.len();
        let previous = run
            .latest()
            .ok_or(Error::InvalidRunState("cannot step before initialization"))?;
        let previous_tolerance = previous.tolerance;

        let mut state = StepState {
            thetas: previous.thetas.clone(),
            distances: previous.distances.clone(),
            tolerance: previous_tolerance,
            changed: vec![false; self.config.nthetas],
            accepted_moves: 0,
            proposed_moves: 0,
            failures: 0,
        };

        let mut phase = Phase::Resampling;
        loop {
            phase = match phase {
                Phase::Resampling => {
                    self.resample_phase(&mut state, generation)?;
                    Phase::Mutating { round: 0 }
                }
                Phase::Mutating { round } => {
                    self.mutation_round(&mut state, generation, round);
                    Phase::CheckingDiversity { round }
                }
                Phase::CheckingDiversity { round } => {
                    let diversity = state.diversity();
                    let moves_next = (round + 2) * self.config.nmoves;
                    if diversity < self.config.minimum_diversity
                        && round < self.config.r
                        && moves_next <= self.config.maxtrials
                    {
                        trace_debug!(
                            "generation {generation}: diversity {diversity:.3} below floor, extra round {}",
                            round + 1
                        );
                        Phase::Mutating { round: round + 1 }
                    } else {
                        Phase::Advancing
                    }
                }
                Phase::Advancing => break,
            };
        }

        let diversity = state.diversity();
        let acceptance_rate = if state.proposed_moves > 0 {
            state.accepted_moves as f64 / state.proposed_moves as f64
        } else {
            0.0
        };
        trace_info!(
            "generation {generation}: tolerance {} -> {}, diversity {diversity:.3}",
            previous_tolerance,
            state.tolerance
        );

        let stalled = state.tolerance >= previous_tolerance;
        let converged = state.tolerance <= self.config.tolerance_target || stalled;
        run.generations.push(Generation {
            thetas: state.thetas,
            distances: state.distances,
            tolerance: state.tolerance,
            acceptance_rate,
            diversity,
            failures: state.failures,
        });
        if converged {
            run.status = Status::Converged;
        }
        Ok(())
    }

    /// Shrinks the tolerance to the configured quantile of current
    /// distances and resamples the survivors back to full size.
    fn resample_phase(&mut self, state: &mut StepState, generation: usize) -> Result<()> {
        let n = self.config.nthetas;
        let finite: Vec<f64> = state
            .distances
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .collect();
        if finite.is_empty() {
            return Err(Error::DegeneratePopulation {
                nthetas: n,
                generation,
            });
        }

        state.tolerance = quantile(&finite, self.config.quantile).min(state.tolerance);
        let survivors: Vec<usize> = state
            .distances
            .iter()
            .enumerate()
            .filter(|(_, &d)| d <= state.tolerance)
            .map(|(i, _)| i)
            .collect();

        // Survivors all satisfy the new tolerance, so they resample with
        // uniform weights.
        let mut rng = SmallRng::seed_from_u64(stream_seed(
            self.config.seed,
            generation as u64,
            RESAMPLE_STREAM,
            0,
        ));
        let picks = resample_indices(
            &vec![1.0; survivors.len()],
            n,
            self.config.resampling,
            &mut rng,
        );

        let (old_thetas, old_distances) = (state.thetas.clone(), state.distances.clone());
        for (row, &pick) in picks.iter().enumerate() {
            let src = survivors[pick];
            state.thetas.row_mut(row).assign(&old_thetas.row(src));
            state.distances[row] = old_distances[src];
        }
        Ok(())
    }

    /// One round of `nmoves` Metropolis moves per particle, in parallel.
    /// Acceptance is restricted to the tolerance ball; every proposed move
    /// re-simulates and re-scores.
    fn mutation_round(&mut self, state: &mut StepState, generation: usize, round: usize) {
        self.kernel.fit(state.thetas.view());

        let nmoves = self.config.nmoves;
        let seed = self.config.seed;
        let tolerance = state.tolerance;
        let observed = self.observed.view();
        let prior = &self.prior;
        let simulator = &self.simulator;
        let kernel = &self.kernel;
        let metric = &self.distance;

        let thetas_before = state.thetas.view();
        let distances_before = state.distances.view();
        let rows: Vec<(Array1<f64>, f64, usize, usize)> = (0..state.thetas.nrows())
            .into_par_iter()
            .map(|i| {
                let mut rng = SmallRng::seed_from_u64(stream_seed(
                    seed,
                    generation as u64,
                    round as u64,
                    i as u64,
                ));
                let mut theta = thetas_before.row(i).to_owned();
                let mut distance = distances_before[i];
                let mut accepted = 0usize;
                let mut failures = 0usize;

                for _ in 0..nmoves {
                    let candidate = kernel.propose(theta.view(), &mut rng);
                    let log_prior_new = prior.log_density(candidate.view());
                    if log_prior_new == f64::NEG_INFINITY {
                        continue;
                    }
                    let candidate_distance = match simulator
                        .simulate(candidate.view(), &mut rng)
                        .and_then(|data| metric.distance(observed, data.view()))
                    {
                        Ok(d) => d,
                        Err(_e) => {
                            trace_debug!(
                                "particle {i} failed to simulate/score during mutation"
                            );
                            failures += 1;
                            continue;
                        }
                    };
                    let log_ratio = log_prior_new - prior.log_density(theta.view())
                        + kernel.log_density(candidate.view(), theta.view())
                        - kernel.log_density(theta.view(), candidate.view());
                    let u: f64 = rng.gen();
                    if candidate_distance <= tolerance && u.ln() < log_ratio {
                        theta = candidate;
                        distance = candidate_distance;
                        accepted += 1;
                    }
                }
                (theta, distance, accepted, failures)
            })
            .collect();

        for (i, (theta, distance, accepted, failures)) in rows.into_iter().enumerate() {
            if accepted > 0 {
                state.changed[i] = true;
            }
            state.accepted_moves += accepted;
            state.proposed_moves += nmoves;
            state.failures += failures;
            state.thetas.row_mut(i).assign(&theta);
            state.distances[i] = distance;
        }
    }
}

impl StepState {
    fn diversity(&self) -> f64 {
        if self.changed.is_empty() {
            return 0.0;
        }
        self.changed.iter().filter(|&&c| c).count() as f64 / self.changed.len() as f64
    }
}

/// Splitmix-style mix of the base seed with a (generation, round, particle)
/// coordinate, giving every unit of work its own reproducible stream.
fn stream_seed(seed: u64, generation: u64, round: u64, particle: u64) -> u64 {
    let mut z = seed
        ^ generation.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ round.wrapping_mul(0xBF58_476D_1CE4_E5B9)
        ^ particle.wrapping_mul(0x94D0_49BB_1331_11EB);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::HilbertDistance;
    use crate::distributions::{
        AdaptiveGaussianKernel, GaussianPrior, GaussianSimulator, UniformPrior,
    };
    use ndarray::arr1;

    fn toy_sampler(
        seed: u64,
    ) -> Wsmc<GaussianPrior, GaussianSimulator, AdaptiveGaussianKernel, HilbertDistance> {
        let prior = GaussianPrior {
            mean: arr1(&[0.0]),
            std: arr1(&[3.0]),
        };
        let simulator = GaussianSimulator { nobs: 40 };
        let observed = simulator
            .simulate(arr1(&[1.0]).view(), &mut SmallRng::seed_from_u64(1234))
            .unwrap();
        let config = WsmcConfig::new(32).set_seed(seed);
        Wsmc::new(
            prior,
            simulator,
            AdaptiveGaussianKernel::default(),
            HilbertDistance { p: 1.0, ground_p: 2.0 },
            observed,
            config,
        )
    }

    fn run_steps(sampler: &mut Wsmc<GaussianPrior, GaussianSimulator, AdaptiveGaussianKernel, HilbertDistance>, steps: usize) -> WsmcRun {
        let initial = sampler.run(Duration::ZERO).unwrap();
        sampler.extend(initial, steps).unwrap()
    }

    #[test]
    fn population_size_is_invariant() {
        let mut sampler = toy_sampler(7);
        let run = run_steps(&mut sampler, 4);
        for generation in &run.generations {
            assert_eq!(generation.thetas.nrows(), 32);
            assert_eq!(generation.distances.len(), 32);
        }
    }

    #[test]
    fn tolerance_schedule_is_non_increasing() {
        let mut sampler = toy_sampler(8);
        let run = run_steps(&mut sampler, 5);
        let tolerances = run.tolerances();
        for pair in tolerances.windows(2) {
            assert!(pair[1] <= pair[0], "tolerances increased: {tolerances:?}");
        }
    }

    #[test]
    fn survivors_respect_their_tolerance() {
        let mut sampler = toy_sampler(9);
        let run = run_steps(&mut sampler, 4);
        for generation in &run.generations {
            for &d in generation.distances.iter() {
                if d.is_finite() {
                    assert!(d <= generation.tolerance + 1e-12);
                }
            }
        }
    }

    #[test]
    fn continuation_reproduces_a_straight_run() {
        let mut straight = toy_sampler(21);
        let full = run_steps(&mut straight, 4);

        let mut resumable = toy_sampler(21);
        let partial = run_steps(&mut resumable, 2);
        let resumed = resumable.extend(partial, 2).unwrap();

        assert_eq!(full.generations.len(), resumed.generations.len());
        for (a, b) in full.generations.iter().zip(resumed.generations.iter()) {
            assert_eq!(a.tolerance, b.tolerance);
            assert_eq!(a.thetas, b.thetas);
            assert_eq!(a.distances, b.distances);
        }
    }

    #[test]
    fn zero_budget_terminates_after_initialization() {
        let mut sampler = toy_sampler(3);
        let run = sampler.run(Duration::ZERO).unwrap();
        assert_eq!(run.generations.len(), 1);
        assert_eq!(run.status, Status::BudgetExhausted);
    }

    #[test]
    fn extending_a_converged_run_is_an_error() {
        let prior = UniformPrior::new(arr1(&[-1.0]), arr1(&[1.0])).unwrap();
        let simulator = GaussianSimulator { nobs: 10 };
        let observed = simulator
            .simulate(arr1(&[0.0]).view(), &mut SmallRng::seed_from_u64(0))
            .unwrap();
        let mut config = WsmcConfig::new(16).set_seed(5);
        // Any tolerance satisfies an infinite floor, so the first step
        // converges immediately.
        config.tolerance_target = f64::INFINITY;
        let mut sampler = Wsmc::new(
            prior,
            simulator,
            AdaptiveGaussianKernel::default(),
            HilbertDistance { p: 1.0, ground_p: 2.0 },
            observed,
            config,
        );
        let initial = sampler.run(Duration::ZERO).unwrap();
        let converged = sampler.extend(initial, 1).unwrap();
        assert_eq!(converged.status, Status::Converged);
        assert!(matches!(
            sampler.extend(converged, 1),
            Err(Error::InvalidRunState(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut sampler = toy_sampler(1);
        sampler.config.nmoves = 0;
        assert!(matches!(
            sampler.run(Duration::from_millis(1)),
            Err(Error::InvalidParameter { name: "nmoves", .. })
        ));
    }

    #[test]
    fn degenerate_population_aborts_the_run() {
        struct FailingSimulator;
        impl crate::model::Simulator for FailingSimulator {
            fn simulate(
                &self,
                _theta: ndarray::ArrayView1<f64>,
                _rng: &mut SmallRng,
            ) -> crate::error::Result<Array2<f64>> {
                Err(Error::Simulation("hardware on fire".to_string()))
            }
        }

        let prior = GaussianPrior {
            mean: arr1(&[0.0]),
            std: arr1(&[1.0]),
        };
        let observed = Array2::zeros((1, 10));
        let mut sampler = Wsmc::new(
            prior,
            FailingSimulator,
            AdaptiveGaussianKernel::default(),
            HilbertDistance { p: 1.0, ground_p: 2.0 },
            observed,
            WsmcConfig::new(8).set_seed(2),
        );
        assert!(matches!(
            sampler.run(Duration::from_millis(10)),
            Err(Error::DegeneratePopulation { generation: 0, .. })
        ));
    }

    #[test]
    fn stream_seeds_differ_across_coordinates() {
        let base = stream_seed(42, 0, 0, 0);
        assert_ne!(base, stream_seed(42, 1, 0, 0));
        assert_ne!(base, stream_seed(42, 0, 1, 0));
        assert_ne!(base, stream_seed(42, 0, 0, 1));
        assert_eq!(base, stream_seed(42, 0, 0, 0));
    }
}
