//! Non-maximum suppression: thin gradient ridges to single-pixel width.
//!
//! Each pixel is compared against the two neighbors lying along its
//! quantized gradient direction. Neighbors outside the grid never win a
//! comparison, so border pixels only compete with the neighbors that
//! exist.

use crate::gradient::Gradient;
use crate::grid::Grid;

/// Keep only strict local maxima along the gradient direction.
///
/// A pixel's magnitude is copied to the output only when it is strictly
/// greater than both of its orientation-relevant neighbors; ties and
/// smaller values leave the output at zero.
///
/// This is stage 3 of the pipeline, between gradient estimation and
/// double thresholding.
#[must_use = "returns the suppressed magnitude grid"]
pub fn suppress(gradient: &Gradient) -> Grid<f64> {
    let magnitude = &gradient.magnitude;
    let suppressed = Grid::from_fn(magnitude.width(), magnitude.height(), |x, y| {
        let m = magnitude[(x, y)];
        let orientation = gradient.orientation[(x, y)];
        if is_local_maximum(magnitude, x, y, orientation.neighbor_offsets()) {
            m
        } else {
            0.0
        }
    });
    tracing::debug!(
        survivors = suppressed.iter().filter(|&&m| m > 0.0).count(),
        "suppressed non-maxima"
    );
    suppressed
}

fn is_local_maximum(
    magnitude: &Grid<f64>,
    x: usize,
    y: usize,
    neighbors: [(isize, isize); 2],
) -> bool {
    let m = magnitude[(x, y)];
    neighbors
        .iter()
        .all(|&(dx, dy)| magnitude.offset(x, y, dx, dy).is_none_or(|n| m > n))
}
