//! 5×5 weighted-average smoothing for noise reduction before gradient
//! estimation.
//!
//! The kernel is a fixed integer approximation of a Gaussian with
//! σ ≈ 1.4. Its weights sum to [`KERNEL_SUM`], so dividing by that sum
//! preserves overall intensity. The input is treated as zero-padded by
//! two samples on every side: pixels near the border are averaged
//! against implicit zeros and come out darker than the interior.

use crate::grid::Grid;

/// Integer smoothing weights, row by row.
pub const KERNEL: [[u8; 5]; 5] = [
    [2, 4, 5, 4, 2],
    [4, 9, 12, 9, 4],
    [5, 12, 15, 12, 5],
    [4, 9, 12, 9, 4],
    [2, 4, 5, 4, 2],
];

/// Sum of all [`KERNEL`] weights.
pub const KERNEL_SUM: f64 = 159.0;

/// Kernel radius (half-width, excluding the center).
const RADIUS: isize = 2;

/// Kernel weights scaled by `1 / KERNEL_SUM`.
fn normalized_kernel() -> [[f64; 5]; 5] {
    let scale = 1.0 / KERNEL_SUM;
    KERNEL.map(|row| row.map(|w| f64::from(w) * scale))
}

/// Smooth an intensity grid with the normalized 5×5 kernel.
///
/// Each output sample is the weighted sum of the 5×5 neighborhood
/// centered on it, accumulated in row-major kernel order. Samples outside
/// the grid contribute zero.
///
/// This is stage 1 of the pipeline, ahead of gradient estimation.
#[must_use = "returns the smoothed grid"]
pub fn smooth(intensity: &Grid<f64>) -> Grid<f64> {
    let kernel = normalized_kernel();
    Grid::from_fn(intensity.width(), intensity.height(), |x, y| {
        convolve_at(intensity, &kernel, x, y)
    })
}

#[allow(clippy::cast_possible_wrap)]
fn convolve_at(grid: &Grid<f64>, kernel: &[[f64; 5]; 5], x: usize, y: usize) -> f64 {
    let (cx, cy) = (x as isize, y as isize);
    let mut total = 0.0;
    for (ky, row) in (-RADIUS..=RADIUS).zip(kernel) {
        for (kx, &weight) in (-RADIUS..=RADIUS).zip(row) {
            total += weight * grid.zero_padded(cx + kx, cy + ky);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_weights_sum_to_159() {
        let sum: u32 = KERNEL.iter().flatten().map(|&w| u32::from(w)).sum();
        assert_eq!(sum, 159);
    }

    #[test]
    fn output_dimensions_preserved() {
        let grid = Grid::filled(17, 31, 0.5);
        let smoothed = smooth(&grid);
        assert_eq!(smoothed.width(), 17);
        assert_eq!(smoothed.height(), 31);
    }

    #[test]
    fn uniform_interior_unchanged_border_darker() {
        let grid = Grid::filled(12, 10, 1.0);
        let smoothed = smooth(&grid);
        for (x, y, &v) in smoothed.enumerate() {
            let interior = (2..10).contains(&x) && (2..8).contains(&y);
            if interior {
                assert!((v - 1.0).abs() < 1e-12, "interior ({x},{y}) = {v}");
            } else {
                assert!(v < 1.0 - 1e-3, "border ({x},{y}) = {v} should darken");
            }
        }
    }

    #[test]
    fn corner_sees_only_lower_right_quadrant() {
        let grid = Grid::filled(8, 8, 1.0);
        let smoothed = smooth(&grid);
        // Rows 2..=4 and columns 2..=4 of the kernel overlap the grid.
        let expected = f64::from(15 + 12 + 5 + 12 + 9 + 4 + 5 + 4 + 2) / KERNEL_SUM;
        assert!((smoothed[(0, 0)] - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_grid_stays_zero() {
        let grid = Grid::filled(5, 5, 0.0);
        assert!(smooth(&grid).iter().all(|&v| v.abs() < f64::EPSILON));
    }

    #[test]
    fn single_impulse_spreads_kernel() {
        let grid = Grid::from_fn(9, 9, |x, y| if (x, y) == (4, 4) { 1.0 } else { 0.0 });
        let smoothed = smooth(&grid);
        for dy in 0..5 {
            for dx in 0..5 {
                let expected = f64::from(KERNEL[dy][dx]) / KERNEL_SUM;
                let got = smoothed[(2 + dx, 2 + dy)];
                assert!((got - expected).abs() < 1e-12, "({dx},{dy}): {got}");
            }
        }
        assert!(smoothed[(0, 0)].abs() < f64::EPSILON);
    }
}
