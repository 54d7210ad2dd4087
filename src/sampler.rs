use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::lattice::Lattice;
use crate::parameters::ParameterHandle;
use crate::render::{Renderer, Snapshot};

/// Monte Carlo steps between two frames handed to the renderer.
pub const DEFAULT_CADENCE: u64 = 1000;

/// Flip decision for a site with component energy `energy`.
///
/// Positive energy always flips. Otherwise the flip happens with probability
/// `exp(2 * energy / temperature)`; a temperature that is not strictly
/// positive (NaN included) never flips such a site.
pub fn metropolis_accepts(energy: f64, temperature: f64, rng: &mut impl Rng) -> bool {
    if energy > 0.0 {
        return true;
    }
    if !(temperature > 0.0) {
        return false;
    }
    rng.gen::<f64>() < (2.0 * energy / temperature).exp()
}

/// Cancellation token shared between the sampling loop and whoever stops it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLimit {
    Iterations(u64),
    Forever,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub accepted: u64,
    pub frames: u64,
    pub failed_frames: u64,
}

impl RunSummary {
    pub fn acceptance_ratio(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.accepted as f64 / self.iterations as f64
        }
    }
}

/// What a single Monte Carlo step looked at and decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub i: usize,
    pub j: usize,
    pub energy: f64,
    pub temperature: f64,
    pub accepted: bool,
}

/// Single-spin-flip Metropolis driver. The only code that flips spins.
#[derive(Debug)]
pub struct Sampler<R = StdRng> {
    lattice: Lattice,
    rng: R,
    cadence: u64,
    iteration: u64,
    accepted: u64,
}

impl Sampler<StdRng> {
    pub fn seeded(lattice: Lattice, seed: u64) -> Self {
        Self::new(lattice, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Sampler<R> {
    pub fn new(lattice: Lattice, rng: R) -> Self {
        Self {
            lattice,
            rng,
            cadence: DEFAULT_CADENCE,
            iteration: 0,
            accepted: 0,
        }
    }

    pub fn with_cadence(mut self, cadence: u64) -> Self {
        self.cadence = cadence.max(1);
        self
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn parameters(&self) -> ParameterHandle {
        self.lattice.parameters()
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    /// Steps performed over the sampler's lifetime.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Flips accepted over the sampler's lifetime.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lattice.snapshot(self.iteration)
    }

    /// One Monte Carlo step: pick a site uniformly, evaluate its energy under
    /// the current parameters and flip it if the acceptance rule says so.
    pub fn step(&mut self) -> StepOutcome {
        let i = self.rng.gen_range(0..self.lattice.width());
        let j = self.rng.gen_range(0..self.lattice.height());

        let energy = self.lattice.component_energy(i, j);
        let temperature = self.lattice.temperature();
        let accepted = metropolis_accepts(energy, temperature, &mut self.rng);

        if accepted {
            self.lattice.flip(i, j);
            self.accepted += 1;
        }
        self.iteration += 1;

        StepOutcome {
            i,
            j,
            energy,
            temperature,
            accepted,
        }
    }

    /// Runs until `limit` is reached or `stop` is raised.
    ///
    /// The renderer gets the starting configuration and then a snapshot after
    /// every `cadence` steps. Renderer errors are logged and counted, they
    /// never interrupt sampling.
    pub fn run<Re>(&mut self, renderer: &mut Re, limit: RunLimit, stop: &StopSignal) -> RunSummary
    where
        Re: Renderer + ?Sized,
    {
        let mut summary = RunSummary::default();
        if stop.is_raised() {
            return summary;
        }

        let (start_iteration, start_accepted) = (self.iteration, self.accepted);
        tracing::info!(
            width = self.lattice.width(),
            height = self.lattice.height(),
            cadence = self.cadence,
            ?limit,
            "sampling started"
        );

        self.present(renderer, &mut summary);
        loop {
            if let RunLimit::Iterations(n) = limit {
                if self.iteration - start_iteration >= n {
                    break;
                }
            }
            if stop.is_raised() {
                tracing::info!(iteration = self.iteration, "stop requested");
                break;
            }

            self.step();

            if self.iteration % self.cadence == 0 {
                self.present(renderer, &mut summary);
            }
        }

        summary.iterations = self.iteration - start_iteration;
        summary.accepted = self.accepted - start_accepted;
        tracing::info!(
            iterations = summary.iterations,
            acceptance = summary.acceptance_ratio(),
            frames = summary.frames,
            failed_frames = summary.failed_frames,
            "sampling finished"
        );
        summary
    }

    fn present<Re>(&self, renderer: &mut Re, summary: &mut RunSummary)
    where
        Re: Renderer + ?Sized,
    {
        let snapshot = self.snapshot();
        summary.frames += 1;
        tracing::debug!(iteration = self.iteration, "frame");

        if let Err(err) = renderer.render(&snapshot) {
            summary.failed_frames += 1;
            tracing::warn!(iteration = self.iteration, "renderer failed: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Spin, SpinGrid};
    use crate::render::FrameSlot;
    use approx::assert_relative_eq;
    use rand::rngs::mock::StepRng;

    /// Every `gen::<f64>()` returns the largest value below one.
    fn highest_draw() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    /// Every `gen::<f64>()` returns zero.
    fn lowest_draw() -> StepRng {
        StepRng::new(0, 0)
    }

    fn sampler(rows: &[Vec<i8>], temperature: f64, field: f64, seed: u64) -> Sampler {
        let grid = SpinGrid::from_rows(rows).unwrap();
        Sampler::seeded(Lattice::from_grid(grid, temperature, field), seed)
    }

    #[test]
    fn positive_energy_always_flips() {
        for temperature in [50.0, 1e-9, 0.0, -4.0, f64::NAN] {
            assert!(metropolis_accepts(0.5, temperature, &mut highest_draw()));
            assert!(metropolis_accepts(4.0, temperature, &mut highest_draw()));
        }
    }

    #[test]
    fn zero_energy_flips_with_probability_one() {
        assert!(metropolis_accepts(0.0, 1.0, &mut highest_draw()));
        assert!(metropolis_accepts(0.0, 1e-12, &mut highest_draw()));
    }

    #[test]
    fn negative_energy_compares_against_exponential() {
        // exp(2 * -4 / 1) ~ 3.4e-4
        assert!(metropolis_accepts(-4.0, 1.0, &mut lowest_draw()));
        assert!(!metropolis_accepts(-4.0, 1.0, &mut highest_draw()));
    }

    #[test]
    fn non_positive_temperature_rejects_non_positive_energy() {
        for temperature in [0.0, -0.0, -1.0, f64::NEG_INFINITY, f64::NAN] {
            assert!(!metropolis_accepts(0.0, temperature, &mut lowest_draw()));
            assert!(!metropolis_accepts(-2.0, temperature, &mut lowest_draw()));
        }
    }

    #[test]
    fn non_finite_energy_is_rejected() {
        assert!(!metropolis_accepts(f64::NAN, 1.0, &mut lowest_draw()));
        assert!(!metropolis_accepts(f64::NEG_INFINITY, 1.0, &mut lowest_draw()));
    }

    #[test]
    fn acceptance_frequency_matches_formula() {
        let mut rng = StdRng::seed_from_u64(11);
        let trials = 200_000;
        let hits = (0..trials)
            .filter(|_| metropolis_accepts(-1.0, 2.0, &mut rng))
            .count();
        assert_relative_eq!(hits as f64 / trials as f64, (-1.0f64).exp(), epsilon = 0.01);
    }

    #[test]
    fn isolated_down_spin_flips_and_lattice_freezes() {
        let mut sampler = sampler(&[vec![1, 1, 1], vec![1, -1, 1], vec![1, 1, 1]], 0.0, 0.0, 5);
        assert!(sampler.lattice().component_energy(1, 1) > 0.0);

        for _ in 0..2000 {
            let outcome = sampler.step();
            assert_eq!(outcome.accepted, (outcome.i, outcome.j) == (1, 1));
            if outcome.accepted {
                break;
            }
        }
        for _ in 0..2000 {
            assert!(!sampler.step().accepted);
        }

        assert_eq!(sampler.accepted(), 1);
        assert_eq!(sampler.lattice().grid().count_up(), 9);
    }

    #[test]
    fn zero_temperature_never_flips_non_positive_energy() {
        for temperature in [0.0, -3.0] {
            let mut rng = StdRng::seed_from_u64(99);
            let lattice = Lattice::new(8, 8, temperature, 0.0, &mut rng);
            let mut sampler = Sampler::new(lattice, rng);

            for _ in 0..10_000 {
                let outcome = sampler.step();
                if outcome.energy <= 0.0 {
                    assert!(!outcome.accepted, "{:?}", outcome);
                } else {
                    assert!(outcome.accepted, "{:?}", outcome);
                }
            }
        }
    }

    #[test]
    fn zero_energy_sites_always_flip_in_the_loop() {
        let mut sampler = sampler(&[vec![1, -1]], 1.0, 0.0, 17);
        let mut zero_energy_steps = 0;

        for _ in 0..5000 {
            let outcome = sampler.step();
            if outcome.energy == 0.0 {
                zero_energy_steps += 1;
                assert!(outcome.accepted);
            }
        }
        assert!(zero_energy_steps > 0);
    }

    #[test]
    fn parameter_change_reaches_next_step() {
        let mut sampler = sampler(&[vec![1, 1], vec![1, 1]], 50.0, 0.0, 3);
        let params = sampler.parameters();
        assert_eq!(sampler.step().temperature, 50.0);

        std::thread::spawn(move || params.set_temperature(0.0))
            .join()
            .unwrap();

        let outcome = sampler.step();
        assert_eq!(outcome.temperature, 0.0);
        assert_eq!(outcome.accepted, outcome.energy > 0.0);
    }

    #[test]
    fn run_stops_at_iteration_limit() {
        let mut sampler = sampler(&[vec![1, -1], vec![-1, 1]], 2.0, 0.0, 8).with_cadence(250);
        let mut iterations = Vec::new();
        let summary = sampler.run(
            &mut |s: &Snapshot| -> anyhow::Result<()> {
                iterations.push(s.iteration());
                Ok(())
            },
            RunLimit::Iterations(1000),
            &StopSignal::new(),
        );

        assert_eq!(summary.iterations, 1000);
        assert_eq!(sampler.iteration(), 1000);
        assert_eq!(iterations, vec![0, 250, 500, 750, 1000]);
        assert_eq!(summary.frames, 5);
    }

    #[test]
    fn run_without_display_still_samples() {
        let mut sampler = sampler(&[vec![1, -1], vec![-1, 1]], 2.0, 0.0, 6).with_cadence(100);
        let stop = StopSignal::new();

        let summary = sampler.run(&mut None::<FrameSlot>, RunLimit::Iterations(300), &stop);
        assert_eq!(summary.iterations, 300);
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.failed_frames, 0);

        let mut seen = Vec::new();
        let summary = sampler.run(
            &mut Some(|s: &Snapshot| -> anyhow::Result<()> {
                seen.push(s.iteration());
                Ok(())
            }),
            RunLimit::Iterations(200),
            &stop,
        );
        assert_eq!(summary.frames, 3);
        assert_eq!(seen, vec![300, 400, 500]);
    }

    #[test]
    fn snapshot_reflects_whole_steps() {
        let mut sampler = sampler(&[vec![-1]], 1.0, 5.0, 1);
        // -(-1)(-1) - 5 * -1 = 4
        assert!(sampler.step().accepted);
        assert_eq!(sampler.snapshot().spin(0, 0), Spin::Up);
        assert_eq!(sampler.snapshot().iteration(), 1);
    }
}
