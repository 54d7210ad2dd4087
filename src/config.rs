use std::path::PathBuf;

use anyhow::ensure;
use rand::rngs::StdRng;
use rand::SeedableRng;
use structopt::StructOpt;

use crate::lattice::Lattice;
use crate::render::image_dimensions;
use crate::sampler::{RunLimit, Sampler, DEFAULT_CADENCE};

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "ising_metropolis",
    about = "Metropolis Monte Carlo sampling of the 2D Ising model"
)]
pub struct SimulationConfig {
    /// number of lattice rows
    #[structopt(long, default_value = "64")]
    pub width: usize,
    /// number of lattice columns
    #[structopt(long, default_value = "64")]
    pub height: usize,
    /// initial temperature
    #[structopt(short, long, default_value = "50.0", allow_hyphen_values = true)]
    pub temperature: f64,
    /// initial external magnetic field
    #[structopt(long, default_value = "0.0", allow_hyphen_values = true)]
    pub field: f64,
    /// Monte Carlo steps between two rendered frames
    #[structopt(long, default_value = "1000")]
    pub cadence: u64,
    /// stop after this many steps instead of running until interrupted
    #[structopt(short = "n", long)]
    pub iterations: Option<u64>,
    /// seed for the random source, for reproducible runs
    #[structopt(long)]
    pub seed: Option<u64>,
    /// directory receiving one png per rendered frame
    #[structopt(short, long, parse(from_os_str))]
    pub output: Option<PathBuf>,
    /// pixels per spin in rendered frames
    #[structopt(long, default_value = "8")]
    pub scale: u32,
    /// read `temperature <x>` / `field <x>` commands from stdin while running
    #[structopt(long)]
    pub stdin: bool,
    /// log every frame
    #[structopt(short, long)]
    pub verbose: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            temperature: 50.0,
            field: 0.0,
            cadence: DEFAULT_CADENCE,
            iterations: None,
            seed: None,
            output: None,
            scale: 8,
            stdin: false,
            verbose: false,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "lattice must be at least 1x1, got {}x{}",
            self.width,
            self.height
        );
        ensure!(self.cadence > 0, "cadence must be positive");
        ensure!(self.scale > 0, "scale must be positive");
        ensure!(self.field.is_finite(), "magnetic field must be finite");
        if self.output.is_some() {
            image_dimensions(self.width, self.height, self.scale)?;
        }

        if !(self.temperature > 0.0) {
            tracing::warn!(
                temperature = self.temperature,
                "non-positive temperature: only positive-energy flips will be accepted"
            );
        }
        Ok(())
    }

    pub fn limit(&self) -> RunLimit {
        self.iterations.map_or(RunLimit::Forever, RunLimit::Iterations)
    }

    pub fn build_sampler(&self) -> Sampler<StdRng> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let lattice = Lattice::new(
            self.width,
            self.height,
            self.temperature,
            self.field,
            &mut rng,
        );
        Sampler::new(lattice, rng).with_cadence(self.cadence)
    }
}
