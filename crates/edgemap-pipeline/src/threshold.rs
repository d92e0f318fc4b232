//! Double thresholding: classify suppressed magnitudes as strong, weak,
//! or non-edges.

use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::types::PipelineError;

/// A validated `(lower, higher)` threshold pair with `lower <= higher`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    lower: f64,
    higher: f64,
}

impl Thresholds {
    /// Validate and pair two thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if either value is
    /// not finite or `lower > higher`.
    pub fn new(lower: f64, higher: f64) -> Result<Self, PipelineError> {
        if !lower.is_finite() || !higher.is_finite() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "thresholds must be finite, got lower={lower} higher={higher}"
            )));
        }
        if lower > higher {
            return Err(PipelineError::InvalidConfiguration(format!(
                "lower threshold {lower} exceeds higher threshold {higher}"
            )));
        }
        Ok(Self { lower, higher })
    }

    /// The lower (weak) threshold.
    #[must_use]
    pub const fn lower(self) -> f64 {
        self.lower
    }

    /// The higher (strong) threshold.
    #[must_use]
    pub const fn higher(self) -> f64 {
        self.higher
    }

    /// Marker value stored for weak edges: `(lower + higher) / 2`.
    #[must_use]
    pub fn weak_value(self) -> f64 {
        (self.lower + self.higher) / 2.0
    }

    /// Classify a single magnitude.
    ///
    /// Strictly above `higher` is strong; below `lower` is none. Within
    /// `[lower, higher]` the state follows the weak marker value, see
    /// [`between_state`](Self::between_state).
    #[must_use]
    pub fn classify(self, magnitude: f64) -> EdgeState {
        if magnitude > self.higher {
            EdgeState::Strong
        } else if magnitude >= self.lower {
            self.between_state()
        } else {
            EdgeState::None
        }
    }

    /// State of a magnitude lying within `[lower, higher]`.
    ///
    /// Only a marker that is nonzero and below 1 can be promoted by
    /// linking. A marker of exactly 1 is already an edge and seeds
    /// promotion like a strong pixel. A marker of 0, or one above 1, can
    /// never become an edge, so such pixels classify as none.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn between_state(self) -> EdgeState {
        let weak = self.weak_value();
        if weak == 1.0 {
            EdgeState::Strong
        } else if weak != 0.0 && weak < 1.0 {
            EdgeState::Weak
        } else {
            EdgeState::None
        }
    }
}

/// Per-pixel classification consumed by hysteresis linking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeState {
    /// Not an edge.
    #[default]
    None,
    /// Between the thresholds; kept only if linked to a strong edge.
    Weak,
    /// Above the higher threshold.
    Strong,
}

impl EdgeState {
    /// Numeric edge-state value: 0 for none, the weak marker
    /// `(lower + higher) / 2` for weak, 1 for strong.
    #[must_use]
    pub fn value(self, thresholds: Thresholds) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Weak => thresholds.weak_value(),
            Self::Strong => 1.0,
        }
    }
}

/// Classify every pixel of the suppressed-magnitude grid.
///
/// This is stage 4 of the pipeline, between non-maximum suppression and
/// hysteresis linking.
#[must_use = "returns the edge-state grid"]
pub fn classify(suppressed: &Grid<f64>, thresholds: Thresholds) -> Grid<EdgeState> {
    let states = suppressed.map(|&m| thresholds.classify(m));
    tracing::debug!(
        strong = count(&states, EdgeState::Strong),
        weak = count(&states, EdgeState::Weak),
        "classified edge states"
    );
    states
}

/// Number of pixels in `states` equal to `state`.
#[must_use]
pub fn count(states: &Grid<EdgeState>, state: EdgeState) -> usize {
    states.iter().filter(|&&s| s == state).count()
}
