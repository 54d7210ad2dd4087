use rand::Rng;

use crate::grid::{Spin, SpinGrid};
use crate::parameters::ParameterHandle;
use crate::render::Snapshot;

/// Relative positions summed by [`Lattice::local_field_sum`]: the site itself
/// and its four orthogonal neighbours.
const STENCIL: [(isize, isize); 5] = [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)];

/// 2D Ising lattice with open boundaries.
///
/// Spins are only mutated through [`Lattice::flip`]; temperature and field
/// live in shared cells so they can be changed from other threads through
/// [`Lattice::parameters`].
#[derive(Debug)]
pub struct Lattice {
    grid: SpinGrid,
    parameters: ParameterHandle,
}

/// A clone starts from the current temperature and field but owns its own
/// parameter cells.
impl Clone for Lattice {
    fn clone(&self) -> Self {
        Self::from_grid(self.grid.clone(), self.temperature(), self.magnetic_field())
    }
}

impl Lattice {
    /// Random `width x height` configuration, each spin up or down with equal probability.
    pub fn new(
        width: usize,
        height: usize,
        temperature: f64,
        magnetic_field: f64,
        rng: &mut impl Rng,
    ) -> Self {
        Self::from_grid(SpinGrid::random(width, height, rng), temperature, magnetic_field)
    }

    pub fn from_grid(grid: SpinGrid, temperature: f64, magnetic_field: f64) -> Self {
        Self {
            grid,
            parameters: ParameterHandle::new(temperature, magnetic_field),
        }
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    #[inline(always)]
    pub fn grid(&self) -> &SpinGrid {
        &self.grid
    }

    #[inline(always)]
    pub fn spin(&self, i: usize, j: usize) -> Spin {
        self.grid.get(i, j)
    }

    /// Panics if `(i, j)` is outside the lattice.
    #[inline(always)]
    pub fn flip(&mut self, i: usize, j: usize) {
        self.grid.flip(i, j)
    }

    /// Sum of the spin at `(i, j)` and of its in-bounds orthogonal neighbours.
    pub fn local_field_sum(&self, i: usize, j: usize) -> i32 {
        let (i, j) = (i as isize, j as isize);
        STENCIL
            .iter()
            .map(|(di, dj)| (i + di, j + dj))
            .filter(|&(x, y)| self.grid.contains(x, y))
            .map(|(x, y)| self.grid.get(x as usize, y as usize).value() as i32)
            .sum()
    }

    /// `-s * local_field_sum - h * s` for the spin `s` at `(i, j)`.
    ///
    /// The site's own spin is part of the local sum, so an isolated site
    /// still contributes `-1` through the coupling term.
    pub fn component_energy(&self, i: usize, j: usize) -> f64 {
        let spin = self.spin(i, j).value() as f64;
        -spin * self.local_field_sum(i, j) as f64 - self.magnetic_field() * spin
    }

    #[inline(always)]
    pub fn temperature(&self) -> f64 {
        self.parameters.temperature()
    }

    #[inline(always)]
    pub fn magnetic_field(&self) -> f64 {
        self.parameters.magnetic_field()
    }

    pub fn set_temperature(&self, temperature: f64) {
        self.parameters.set_temperature(temperature)
    }

    pub fn set_magnetic_field(&self, magnetic_field: f64) {
        self.parameters.set_magnetic_field(magnetic_field)
    }

    /// Handle sharing this lattice's temperature and field cells.
    pub fn parameters(&self) -> ParameterHandle {
        self.parameters.clone()
    }

    pub fn snapshot(&self, iteration: u64) -> Snapshot {
        Snapshot::new(iteration, self.grid.clone())
    }
}
