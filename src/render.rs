use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Context};
use image::{Rgb, RgbImage};

use crate::grid::{Spin, SpinGrid};

/// Read-only copy of the lattice taken between two Monte Carlo steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    iteration: u64,
    grid: SpinGrid,
}

impl Snapshot {
    pub(crate) fn new(iteration: u64, grid: SpinGrid) -> Self {
        Self { iteration, grid }
    }

    /// Number of Monte Carlo steps performed before the copy was taken.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn grid(&self) -> &SpinGrid {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn spin(&self, i: usize, j: usize) -> Spin {
        self.grid.get(i, j)
    }
}

/// Receives snapshots from the sampler at a fixed cadence.
pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

impl<F> Renderer for F
where
    F: FnMut(&Snapshot) -> anyhow::Result<()>,
{
    fn render(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// `None` drops every frame: nothing is watching.
impl<R: Renderer> Renderer for Option<R> {
    fn render(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        match self {
            Some(renderer) => renderer.render(snapshot),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub up: [u8; 3],
    pub down: [u8; 3],
}

impl Palette {
    #[inline(always)]
    pub fn color(&self, spin: Spin) -> [u8; 3] {
        match spin {
            Spin::Up => self.up,
            Spin::Down => self.down,
        }
    }
}

impl Default for Palette {
    /// Ends of the viridis colour map.
    fn default() -> Self {
        Self {
            up: [253, 231, 37],
            down: [68, 1, 84],
        }
    }
}

/// Pixel `(columns, rows)` of a `width x height` lattice drawn at `scale`.
pub fn image_dimensions(width: usize, height: usize, scale: u32) -> anyhow::Result<(u32, u32)> {
    let pixels = |cells: usize| {
        u32::try_from(cells)
            .ok()
            .and_then(|cells| cells.checked_mul(scale))
            .ok_or_else(|| {
                anyhow!(
                    "{}x{} lattice at scale {} does not fit in an image",
                    width,
                    height,
                    scale
                )
            })
    };
    Ok((pixels(height)?, pixels(width)?))
}

/// One `scale x scale` block per spin; pixel columns follow `j`, pixel rows follow `i`.
pub fn to_image(snapshot: &Snapshot, scale: u32, palette: &Palette) -> anyhow::Result<RgbImage> {
    let scale = scale.max(1);
    let (columns, rows) = image_dimensions(snapshot.width(), snapshot.height(), scale)?;

    Ok(RgbImage::from_fn(columns, rows, |x, y| {
        let spin = snapshot.spin((y / scale) as usize, (x / scale) as usize);
        Rgb(palette.color(spin))
    }))
}

/// Writes each snapshot to `<dir>/frame_<iteration>.png`.
#[derive(Debug)]
pub struct PngSequence {
    dir: PathBuf,
    scale: u32,
    palette: Palette,
    written: usize,
}

impl PngSequence {
    pub fn new(dir: impl AsRef<Path>, scale: u32) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create frame directory {}", dir.display()))?;

        Ok(Self {
            dir,
            scale,
            palette: Palette::default(),
            written: 0,
        })
    }

    pub fn frame_path(&self, iteration: u64) -> PathBuf {
        self.dir.join(format!("frame_{:012}.png", iteration))
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Renderer for PngSequence {
    fn render(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let path = self.frame_path(snapshot.iteration());
        to_image(snapshot, self.scale, &self.palette)?
            .save(&path)
            .with_context(|| format!("cannot write frame {}", path.display()))?;

        self.written += 1;
        tracing::debug!(path = %path.display(), "frame written");
        Ok(())
    }
}

/// Single-frame mailbox between the sampling thread and a display thread.
///
/// Publishing overwrites whatever the display has not picked up yet, so a
/// slow display only sees fewer frames and never holds the sampler back.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot(Arc<Mutex<Option<Snapshot>>>);

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: Snapshot) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Newest unseen frame, if any.
    pub fn take(&self) -> Option<Snapshot> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl Renderer for FrameSlot {
    fn render(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.publish(snapshot.clone());
        Ok(())
    }
}
