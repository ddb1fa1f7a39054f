//! Synthetic CPU workload: repeated 3×3 convolution over a fixed grid.
//!
//! The output is never consumed. The only purpose of [`run_workload`] is to
//! burn a deterministic amount of CPU time that scales with the configured
//! [`ComputeLoad`], so the frame pacer has something real to time.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Side length of the square workload grid.
pub const GRID_SIZE: usize = 256;

/// Edge-detection style kernel applied on every pass.
pub const KERNEL: [[f32; 3]; 3] = [[1.0, 0.0, -1.0], [2.0, 0.0, -2.0], [1.0, 0.0, -1.0]];

// ---------------------------------------------------------------------------
// ComputeLoad
// ---------------------------------------------------------------------------

/// Workload intensity level, always within `[ComputeLoad::MIN, ComputeLoad::MAX]`.
///
/// Each level is one convolution pass, so level 5 costs roughly five times
/// level 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct ComputeLoad(u8);

impl ComputeLoad {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Clamp an arbitrary level into the valid range.
    pub fn new(level: i64) -> Self {
        Self(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Intensity to run while power-save is active: one level lower, never below 1.
    pub fn for_power_save(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN))
    }

    /// Every valid level, lowest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl Default for ComputeLoad {
    fn default() -> Self {
        Self(2)
    }
}

impl From<ComputeLoad> for u8 {
    fn from(load: ComputeLoad) -> Self {
        load.0
    }
}

impl From<i64> for ComputeLoad {
    fn from(level: i64) -> Self {
        Self::new(level)
    }
}

impl std::fmt::Display for ComputeLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// Convolution
// ---------------------------------------------------------------------------

/// Fresh `size × size` grid with cell `i` set to `i mod 256`.
pub fn seed_grid(size: usize) -> Vec<f32> {
    (0..size * size).map(|i| (i % 256) as f32).collect()
}

/// One convolution pass of [`KERNEL`] over a row-major `width × height` grid.
///
/// Out-of-range neighbours clamp to the nearest valid row/column.
///
/// # Panics
/// Panics if either slice is shorter than `width * height`.
pub fn convolve(input: &[f32], output: &mut [f32], width: usize, height: usize) {
    assert!(input.len() >= width * height && output.len() >= width * height);
    if width == 0 || height == 0 {
        return;
    }
    let max_x = width as isize - 1;
    let max_y = height as isize - 1;

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0f32;
            for (ky, row) in KERNEL.iter().enumerate() {
                let sy = (y as isize + ky as isize - 1).clamp(0, max_y) as usize;
                for (kx, &k) in row.iter().enumerate() {
                    let sx = (x as isize + kx as isize - 1).clamp(0, max_x) as usize;
                    sum += input[sy * width + sx] * k;
                }
            }
            output[y * width + x] = sum;
        }
    }
}

/// Burn CPU proportional to `intensity`: `intensity` chained passes over a
/// fresh [`GRID_SIZE`]² grid.
pub fn run_workload(intensity: ComputeLoad) {
    let mut grid = seed_grid(GRID_SIZE);
    let mut scratch = vec![0.0f32; GRID_SIZE * GRID_SIZE];
    for _ in 0..intensity.get() {
        convolve(&grid, &mut scratch, GRID_SIZE, GRID_SIZE);
        std::mem::swap(&mut grid, &mut scratch);
    }
    std::hint::black_box(&grid);
}

/// CPU work executed once per pacer cycle.
pub trait Workload: Send + Sync {
    /// Run one cycle's worth of work at `intensity`. Blocks until done.
    fn run(&self, intensity: ComputeLoad);
}

/// The standard workload: [`run_workload`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConvolutionWorkload;

impl Workload for ConvolutionWorkload {
    fn run(&self, intensity: ComputeLoad) {
        run_workload(intensity);
    }
}

/// Time `trials` runs of the workload at `intensity`.
pub fn measure_workload(intensity: ComputeLoad, trials: usize) -> Vec<Duration> {
    (0..trials)
        .map(|_| {
            let t0 = Instant::now();
            run_workload(intensity);
            t0.elapsed()
        })
        .collect()
}
