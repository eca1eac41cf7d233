//! Escape-time kernel.
//!
//! Each cell is an independent closed-form computation: iterate
//! `z = z^2 + c` from zero until `|z|` reaches the horizon or the iteration
//! cap runs out, then smooth the count so colour bands blend.

use num_complex::Complex64;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::mandelbrot::request::Bounds;

/// Row-major image of escape values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

/// Number of cells in a `width x height` grid, or `None` if it cannot be
/// allocated.
pub fn cell_count(width: usize, height: usize) -> Option<usize> {
    let cells = width.checked_mul(height)?;
    let bytes = cells.checked_mul(std::mem::size_of::<f64>())?;
    (bytes <= isize::MAX as usize).then_some(cells)
}

impl Grid {
    pub fn zeros(width: usize, height: usize) -> Option<Self> {
        Some(Self {
            width,
            height,
            values: vec![0.0; cell_count(width, height)?],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.height {
            return None;
        }
        self.values.get(row * self.width..(row + 1) * self.width)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.width.max(1))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Reverse the row order in place, so row 0 becomes the top of the image.
    pub fn flip_vertical(&mut self) {
        let (width, height) = (self.width, self.height);
        for row in 0..height / 2 {
            let mirror = height - 1 - row;
            for col in 0..width {
                self.values.swap(row * width + col, mirror * width + col);
            }
        }
    }

    /// Smallest and largest value, `None` for an empty grid.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// `n` evenly spaced samples over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Smoothed escape value for one point.
///
/// Points that never escape within `maxiter` map to a count of zero, as do
/// results that are not a number.
pub fn escape_time(c: Complex64, maxiter: u32, horizon: f64) -> f64 {
    let mut z = Complex64::new(0.0, 0.0);
    let mut n = 0u32;
    for i in 0..maxiter {
        if z.norm() >= horizon {
            break;
        }
        n = i;
        z = z * z + c;
    }
    if maxiter > 0 && n == maxiter - 1 {
        n = 0;
    }

    let log_horizon = horizon.ln().log2();
    let smoothed = f64::from(n) + 1.0 - z.norm().ln().log2() + log_horizon;
    nan_to_num(smoothed)
}

fn nan_to_num(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else if v == f64::INFINITY {
        f64::MAX
    } else if v == f64::NEG_INFINITY {
        f64::MIN
    } else {
        v
    }
}

/// Escape values over a `width x height` grid spanning `bounds`. Row 0 is
/// `ymin`.
pub fn mandelbrot_image(
    bounds: &Bounds,
    width: usize,
    height: usize,
    maxiter: u32,
    horizon: f64,
) -> Result<Grid> {
    let mut grid = Grid::zeros(width, height)
        .ok_or_else(|| Error::Config(format!("grid {width}x{height} is too large")))?;
    let xs = linspace(bounds.xmin, bounds.xmax, width);
    let ys = linspace(bounds.ymin, bounds.ymax, height);

    for (row, &y) in ys.iter().enumerate() {
        let out = &mut grid.values[row * width..(row + 1) * width];
        for (cell, &x) in out.iter_mut().zip(&xs) {
            *cell = escape_time(Complex64::new(x, y), maxiter, horizon);
        }
    }
    Ok(grid)
}
