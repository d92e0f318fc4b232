//! Hysteresis edge linking.
//!
//! Weak pixels are promoted to strong when 8-connected to a strong pixel,
//! directly or through a chain of other weak pixels. Promotion is a
//! breadth-first flood fill seeded with every strong pixel; it reaches
//! the same fixed point as repeatedly sweeping the grid and promoting any
//! weak pixel with a strong neighbor until a sweep changes nothing.
//! Afterwards every strong pixel becomes 1 and everything else 0.

use std::collections::VecDeque;

use crate::grid::{Grid, NEIGHBORS_8};
use crate::threshold::EdgeState;

/// Output value for edge pixels in the binary map.
pub const EDGE: u8 = 1;

/// Output value for background pixels in the binary map.
pub const BACKGROUND: u8 = 0;

/// Promote weak pixels connected to strong ones in place.
///
/// Returns the number of weak pixels promoted. States only ever move from
/// weak to strong.
pub fn promote(states: &mut Grid<EdgeState>) -> usize {
    let mut queue: VecDeque<(usize, usize)> = states
        .enumerate()
        .filter(|&(_, _, &s)| s == EdgeState::Strong)
        .map(|(x, y, _)| (x, y))
        .collect();

    let mut promoted = 0;
    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in NEIGHBORS_8 {
            let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
                continue;
            };
            if states.get(nx, ny) == Some(EdgeState::Weak) {
                states.set(nx, ny, EdgeState::Strong);
                promoted += 1;
                queue.push_back((nx, ny));
            }
        }
    }
    promoted
}

/// Collapse states to a binary edge map: strong → [`EDGE`], else
/// [`BACKGROUND`].
#[must_use]
pub fn collapse(states: &Grid<EdgeState>) -> Grid<u8> {
    states.map(|&s| {
        if s == EdgeState::Strong {
            EDGE
        } else {
            BACKGROUND
        }
    })
}

/// Link weak edges to strong ones and produce the final binary map.
///
/// This is stage 5, the last stage of the pipeline.
#[must_use = "returns the binary edge map"]
pub fn link(states: &Grid<EdgeState>) -> Grid<u8> {
    let mut working = states.clone();
    let promoted = promote(&mut working);
    let edges = collapse(&working);
    tracing::debug!(
        promoted,
        edge_pixels = count_edges(&edges),
        "linked weak edges"
    );
    edges
}

/// Number of [`EDGE`] pixels in a binary map.
#[must_use]
pub fn count_edges(edges: &Grid<u8>) -> usize {
    edges.iter().filter(|&&v| v == EDGE).count()
}
