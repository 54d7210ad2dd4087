use std::io::BufRead;
use std::thread;

use anyhow::Context;
use ising_metropolis::{
    logging, ParameterHandle, ParameterUpdate, PngSequence, SimulationConfig, StopSignal,
};
use structopt::StructOpt;

fn main() -> anyhow::Result<()> {
    let config = SimulationConfig::from_args();
    logging::init(config.verbose);
    config.validate()?;

    let mut sampler = config.build_sampler();

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.raise()).context("cannot install Ctrl-C handler")?;
    }

    if config.stdin {
        read_parameters_from_stdin(sampler.parameters());
    }

    let mut frames = config
        .output
        .as_ref()
        .map(|dir| PngSequence::new(dir, config.scale))
        .transpose()?;

    let summary = {
        measure_time::info_time!("sampling");
        sampler.run(&mut frames, config.limit(), &stop)
    };

    if summary.failed_frames > 0 {
        tracing::warn!(
            failed = summary.failed_frames,
            total = summary.frames,
            "some frames could not be rendered"
        );
    }
    Ok(())
}

/// Applies `temperature <x>` / `field <x>` lines as they arrive. The thread
/// lives until stdin closes or the process exits.
fn read_parameters_from_stdin(parameters: ParameterHandle) {
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!("stdin closed: {}", err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ParameterUpdate>() {
                Ok(update) => {
                    parameters.apply(update);
                    tracing::info!(?update, "parameter updated");
                }
                Err(err) => tracing::warn!("ignoring `{}`: {:#}", line.trim(), err),
            }
        }
    });
}
