use std::ops::Neg;

use anyhow::{bail, ensure};
use bitvec::prelude::BitVec;
use rand::Rng;

/// Orientation of a single magnetic moment.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Spin {
    Down,
    Up,
}

impl Spin {
    #[inline(always)]
    pub fn from_bool(up: bool) -> Self {
        if up {
            Spin::Up
        } else {
            Spin::Down
        }
    }

    #[inline(always)]
    pub fn is_up(self) -> bool {
        self == Spin::Up
    }

    /// `+1` for up, `-1` for down.
    #[inline(always)]
    pub fn value(self) -> i8 {
        match self {
            Spin::Up => 1,
            Spin::Down => -1,
        }
    }
}

impl Neg for Spin {
    type Output = Spin;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        match self {
            Spin::Up => Spin::Down,
            Spin::Down => Spin::Up,
        }
    }
}

impl TryFrom<i8> for Spin {
    type Error = anyhow::Error;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Spin::Up),
            -1 => Ok(Spin::Down),
            other => bail!("spin value must be +1 or -1, got {}", other),
        }
    }
}

/// Fixed `width x height` grid of spins, one bit per cell (set = up).
///
/// Cells are addressed as `(i, j)` with row `i < width` and column `j < height`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SpinGrid {
    state: BitVec,
    width: usize,
    height: usize,
}

impl SpinGrid {
    pub fn new(width: usize, height: usize, fill: Spin) -> Self {
        Self {
            state: BitVec::repeat(fill.is_up(), width * height),
            width,
            height,
        }
    }

    /// Every cell is an independent fair coin.
    pub fn random(width: usize, height: usize, rng: &mut impl Rng) -> Self {
        let state = (0..width * height).map(|_| rng.gen_bool(0.5)).collect();
        Self { state, width, height }
    }

    pub fn from_rows(rows: &[Vec<i8>]) -> anyhow::Result<Self> {
        ensure!(!rows.is_empty(), "spin grid needs at least one row");
        let width = rows.len();
        let height = rows[0].len();
        ensure!(height > 0, "spin grid needs at least one column");

        let mut state = BitVec::with_capacity(width * height);
        for (i, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == height,
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                height
            );
            for &value in row {
                state.push(Spin::try_from(value)?.is_up());
            }
        }

        Ok(Self { state, width, height })
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    pub fn contains(&self, i: isize, j: isize) -> bool {
        0 <= i && (i as usize) < self.width && 0 <= j && (j as usize) < self.height
    }

    #[inline(always)]
    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.width && j < self.height,
            "spin ({}, {}) is outside the {}x{} grid",
            i,
            j,
            self.width,
            self.height
        );
        i * self.height + j
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> Spin {
        Spin::from_bool(self.state[self.offset(i, j)])
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, spin: Spin) {
        let offset = self.offset(i, j);
        self.state.set(offset, spin.is_up());
    }

    #[inline(always)]
    pub fn flip(&mut self, i: usize, j: usize) {
        let offset = self.offset(i, j);
        let up = self.state[offset];
        self.state.set(offset, !up);
    }

    pub fn count_up(&self) -> usize {
        self.state.count_ones()
    }

    /// Rows in order, each yielding its spins column by column.
    pub fn rows(&self) -> impl Iterator<Item = impl Iterator<Item = Spin> + '_> + '_ {
        self.state
            .chunks(self.height)
            .map(|row| row.iter().by_vals().map(Spin::from_bool))
    }
}
