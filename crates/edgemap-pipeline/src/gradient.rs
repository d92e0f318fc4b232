//! Sobel gradient estimation with orientation quantized to four
//! undirected buckets.
//!
//! Gradients are computed on the smoothed grid, zero-padded by one
//! sample per side. The raw angle is the single-quadrant arctangent
//! `atan(gy / gx)` in degrees, which lies in `(-90°, 90°]`. Quantization
//! rounds to the nearest multiple of 45° and folds modulo 180°, so a
//! full four-quadrant angle would land in the same bucket anyway:
//! `atan2` differs from `atan` only by ±180° when `gx < 0`.
//!
//! `gy` is positive when intensity increases *upward* (toward row 0),
//! so a 45° orientation points to the upper-right neighbor.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::grid::Grid;

/// Horizontal derivative kernel.
pub const KERNEL_X: [[i8; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];

/// Vertical derivative kernel (top row minus bottom row).
pub const KERNEL_Y: [[i8; 3]; 3] = [[1, 2, 1], [0, 0, 0], [-1, -2, -1]];

/// Gradient direction rounded to one of four undirected lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Horizontal gradient: the edge runs vertically.
    #[default]
    Deg0,
    /// Gradient toward the upper-right.
    Deg45,
    /// Vertical gradient: the edge runs horizontally.
    Deg90,
    /// Gradient toward the upper-left.
    Deg135,
}

impl Orientation {
    /// All four buckets in ascending angle order.
    pub const ALL: [Self; 4] = [Self::Deg0, Self::Deg45, Self::Deg90, Self::Deg135];

    /// The bucket angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg45 => 45,
            Self::Deg90 => 90,
            Self::Deg135 => 135,
        }
    }

    /// Position in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Deg0 => 0,
            Self::Deg45 => 1,
            Self::Deg90 => 2,
            Self::Deg135 => 3,
        }
    }

    /// The two `(dx, dy)` neighbor offsets lying along the gradient
    /// direction, i.e. across the edge.
    #[must_use]
    pub const fn neighbor_offsets(self) -> [(isize, isize); 2] {
        match self {
            Self::Deg0 => [(-1, 0), (1, 0)],
            Self::Deg45 => [(1, -1), (-1, 1)],
            Self::Deg90 => [(0, -1), (0, 1)],
            Self::Deg135 => [(-1, -1), (1, 1)],
        }
    }
}

/// Round an angle in degrees to the nearest orientation bucket.
///
/// With `b = angle mod 45` (always non-negative), the angle rounds down
/// when `b < 22.5` and up otherwise; the result is folded modulo 180.
/// Non-finite angles map to [`Orientation::Deg0`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn quantize(angle: f64) -> Orientation {
    if !angle.is_finite() {
        return Orientation::Deg0;
    }
    let b = angle.rem_euclid(45.0);
    let rounded = if 45.0 - b > b {
        angle - b
    } else {
        angle - b + 45.0
    };
    let folded = rounded.rem_euclid(180.0);
    match ((folded / 45.0).round() as i64).rem_euclid(4) {
        1 => Orientation::Deg45,
        2 => Orientation::Deg90,
        3 => Orientation::Deg135,
        _ => Orientation::Deg0,
    }
}

/// Single-quadrant gradient angle in degrees.
///
/// A vertical gradient (`gx == 0`) is 90°; a flat one (`gx == gy == 0`)
/// is 0°.
#[must_use]
pub fn angle_degrees(gx: f64, gy: f64) -> f64 {
    if gx == 0.0 {
        return if gy == 0.0 { 0.0 } else { 90.0 };
    }
    (gy / gx).atan() * 180.0 / PI
}

/// Per-pixel gradient magnitude and quantized orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// `sqrt(gx² + gy²)`, never negative.
    pub magnitude: Grid<f64>,
    /// Quantized direction of the gradient.
    pub orientation: Grid<Orientation>,
}

/// Estimate gradients of the smoothed intensity grid.
///
/// This is stage 2 of the pipeline, between smoothing and non-maximum
/// suppression.
#[must_use = "returns the gradient grids"]
pub fn estimate(smoothed: &Grid<f64>) -> Gradient {
    let (width, height) = (smoothed.width(), smoothed.height());
    let mut magnitude = Grid::filled(width, height, 0.0);
    let mut orientation = Grid::filled(width, height, Orientation::Deg0);

    for y in 0..height {
        for x in 0..width {
            let gx = convolve_at(smoothed, &KERNEL_X, x, y);
            let gy = convolve_at(smoothed, &KERNEL_Y, x, y);
            magnitude.set(x, y, hypot_plain(gx, gy));
            orientation.set(x, y, quantize(angle_degrees(gx, gy)));
        }
    }

    tracing::debug!(width, height, "estimated gradients");
    Gradient {
        magnitude,
        orientation,
    }
}

// Fused multiply-add would round differently from squaring and summing.
#[allow(clippy::suboptimal_flops)]
fn hypot_plain(gx: f64, gy: f64) -> f64 {
    (gx * gx + gy * gy).sqrt()
}

#[allow(clippy::cast_possible_wrap)]
fn convolve_at(grid: &Grid<f64>, kernel: &[[i8; 3]; 3], x: usize, y: usize) -> f64 {
    let (cx, cy) = (x as isize, y as isize);
    let mut total = 0.0;
    for (ky, row) in (-1..=1).zip(kernel) {
        for (kx, &weight) in (-1..=1).zip(row) {
            total += f64::from(weight) * grid.zero_padded(cx + kx, cy + ky);
        }
    }
    total
}
