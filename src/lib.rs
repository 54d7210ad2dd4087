pub mod config;
pub mod grid;
pub mod lattice;
pub mod logging;
pub mod parameters;
pub mod render;
pub mod sampler;

pub use config::SimulationConfig;
pub use grid::{Spin, SpinGrid};
pub use lattice::Lattice;
pub use parameters::{ParameterHandle, ParameterUpdate};
pub use render::{FrameSlot, PngSequence, Renderer, Snapshot};
pub use sampler::{metropolis_accepts, RunLimit, RunSummary, Sampler, StepOutcome, StopSignal};
