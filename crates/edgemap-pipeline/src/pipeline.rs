//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate grid before continuing.
//!
//! Unlike [`crate::detect_edges`] which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use edgemap_pipeline::{Grid, Pipeline, PipelineConfig, PipelineError};
//! # fn run(intensity: Grid<f64>) -> Result<(), PipelineError> {
//! let linked = Pipeline::new(intensity, PipelineConfig::default())?
//!     .smooth()
//!     .estimate_gradient()
//!     .suppress()
//!     .threshold()
//!     .link();
//!
//! let staged = linked.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every previously computed grid. Stage outputs are fresh
//! allocations; no stage mutates an earlier grid. Only construction is
//! fallible: once the input and thresholds are validated, every stage
//! runs to completion.

use crate::diagnostics::{StageMetrics, grid_mean};
use crate::gradient::{Gradient, Orientation};
use crate::grid::Grid;
use crate::hysteresis::count_edges;
use crate::threshold::{EdgeState, Thresholds, count};
use crate::types::{Dimensions, PipelineConfig, PipelineError, StagedResult};

/// Entry point for building a staged pipeline run.
pub struct Pipeline;

impl Pipeline {
    /// Validate the input grid and configuration and return the
    /// [`Pending`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if the grid is empty.
    /// Returns [`PipelineError::InvalidConfiguration`] if the thresholds
    /// are not finite or `lower > higher`.
    pub fn new(intensity: Grid<f64>, config: PipelineConfig) -> Result<Pending, PipelineError> {
        if intensity.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "intensity grid is empty ({}x{})",
                intensity.width(),
                intensity.height()
            )));
        }
        let thresholds = config.validate()?;
        tracing::debug!(
            width = intensity.width(),
            height = intensity.height(),
            lower = thresholds.lower(),
            higher = thresholds.higher(),
            "starting edge detection"
        );
        Ok(Pending {
            thresholds,
            intensity,
        })
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`smooth`](Self::smooth) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
#[derive(Debug, Clone)]
pub struct Pending {
    thresholds: Thresholds,
    intensity: Grid<f64>,
}

impl Pending {
    /// The source intensity grid.
    #[must_use]
    pub const fn intensity(&self) -> &Grid<f64> {
        &self.intensity
    }

    /// Advance to the smoothing stage.
    pub fn smooth(self) -> Smoothed {
        let smoothed = crate::smooth::smooth(&self.intensity);
        Smoothed {
            thresholds: self.thresholds,
            intensity: self.intensity,
            smoothed,
        }
    }
}

// ───────────────────────── Stage 1: Smoothed ─────────────────────────

/// Pipeline state after 5×5 smoothing.
///
/// Call [`estimate_gradient`](Self::estimate_gradient) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .estimate_gradient() to continue"]
#[derive(Debug, Clone)]
pub struct Smoothed {
    thresholds: Thresholds,
    intensity: Grid<f64>,
    smoothed: Grid<f64>,
}

impl Smoothed {
    /// The smoothed intensity grid.
    #[must_use]
    pub const fn smoothed(&self) -> &Grid<f64> {
        &self.smoothed
    }

    /// Advance to the gradient estimation stage.
    pub fn estimate_gradient(self) -> GradientEstimated {
        let gradient = crate::gradient::estimate(&self.smoothed);
        GradientEstimated {
            thresholds: self.thresholds,
            intensity: self.intensity,
            smoothed: self.smoothed,
            gradient,
        }
    }
}

// ───────────────────────── Stage 2: GradientEstimated ────────────────

/// Pipeline state after Sobel gradient estimation.
///
/// Call [`suppress`](Self::suppress) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .suppress() to continue"]
#[derive(Debug, Clone)]
pub struct GradientEstimated {
    thresholds: Thresholds,
    intensity: Grid<f64>,
    smoothed: Grid<f64>,
    gradient: Gradient,
}

impl GradientEstimated {
    /// Gradient magnitude and quantized orientation.
    #[must_use]
    pub const fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    /// Advance to the non-maximum suppression stage.
    pub fn suppress(self) -> Suppressed {
        let suppressed = crate::suppress::suppress(&self.gradient);
        Suppressed {
            thresholds: self.thresholds,
            intensity: self.intensity,
            smoothed: self.smoothed,
            gradient: self.gradient,
            suppressed,
        }
    }
}

// ───────────────────────── Stage 3: Suppressed ───────────────────────

/// Pipeline state after non-maximum suppression.
///
/// Call [`threshold`](Self::threshold) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .threshold() to continue"]
#[derive(Debug, Clone)]
pub struct Suppressed {
    thresholds: Thresholds,
    intensity: Grid<f64>,
    smoothed: Grid<f64>,
    gradient: Gradient,
    suppressed: Grid<f64>,
}

impl Suppressed {
    /// Magnitudes that survived suppression (zero elsewhere).
    #[must_use]
    pub const fn suppressed(&self) -> &Grid<f64> {
        &self.suppressed
    }

    /// Advance to the double thresholding stage.
    pub fn threshold(self) -> Thresholded {
        let edge_states = crate::threshold::classify(&self.suppressed, self.thresholds);
        Thresholded {
            thresholds: self.thresholds,
            intensity: self.intensity,
            smoothed: self.smoothed,
            gradient: self.gradient,
            suppressed: self.suppressed,
            edge_states,
        }
    }
}

// ───────────────────────── Stage 4: Thresholded ──────────────────────

/// Pipeline state after double thresholding.
///
/// Call [`link`](Self::link) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .link() to continue"]
#[derive(Debug, Clone)]
pub struct Thresholded {
    thresholds: Thresholds,
    intensity: Grid<f64>,
    smoothed: Grid<f64>,
    gradient: Gradient,
    suppressed: Grid<f64>,
    edge_states: Grid<EdgeState>,
}

impl Thresholded {
    /// None/weak/strong classification of every pixel.
    #[must_use]
    pub const fn edge_states(&self) -> &Grid<EdgeState> {
        &self.edge_states
    }

    /// The classification as numeric values: 0, `(lower + higher) / 2`,
    /// or 1.
    #[must_use]
    pub fn edge_state_values(&self) -> Grid<f64> {
        self.edge_states.map(|s| s.value(self.thresholds))
    }

    /// Advance to hysteresis linking, the final stage.
    pub fn link(self) -> Linked {
        let edges = crate::hysteresis::link(&self.edge_states);
        Linked {
            thresholds: self.thresholds,
            intensity: self.intensity,
            smoothed: self.smoothed,
            gradient: self.gradient,
            suppressed: self.suppressed,
            edge_states: self.edge_states,
            edges,
        }
    }
}

// ───────────────────────── Stage 5: Linked ───────────────────────────

/// Pipeline state after hysteresis linking, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
#[derive(Debug, Clone)]
pub struct Linked {
    thresholds: Thresholds,
    intensity: Grid<f64>,
    smoothed: Grid<f64>,
    gradient: Gradient,
    suppressed: Grid<f64>,
    edge_states: Grid<EdgeState>,
    edges: Grid<u8>,
}

impl Linked {
    /// The binary edge map (1 = edge, 0 = background).
    #[must_use]
    pub const fn edges(&self) -> &Grid<u8> {
        &self.edges
    }

    /// Source dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.intensity.dimensions()
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = self.dimensions();
        StagedResult {
            intensity: self.intensity,
            smoothed: self.smoothed,
            magnitude: self.gradient.magnitude,
            orientation: self.gradient.orientation,
            suppressed: self.suppressed,
            edge_states: self.edge_states,
            edges: self.edges,
            thresholds: self.thresholds,
            dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline, `Pending` included.
pub const STAGE_COUNT: usize = 6;

/// The grid(s) produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// Source intensity.
    Source {
        /// The input grid.
        intensity: &'a Grid<f64>,
    },
    /// Smoothing result.
    Smoothed {
        /// The smoothed grid.
        smoothed: &'a Grid<f64>,
    },
    /// Gradient estimation result.
    Gradient {
        /// Gradient magnitude.
        magnitude: &'a Grid<f64>,
        /// Quantized orientation.
        orientation: &'a Grid<Orientation>,
    },
    /// Non-maximum suppression result.
    Suppressed {
        /// Surviving magnitudes.
        suppressed: &'a Grid<f64>,
    },
    /// Double thresholding result.
    Thresholded {
        /// Edge classification.
        edge_states: &'a Grid<EdgeState>,
        /// Thresholds used.
        thresholds: Thresholds,
    },
    /// Hysteresis linking result.
    Linked {
        /// Binary edge map.
        edges: &'a Grid<u8>,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// # Loop pattern
///
/// ```rust
/// # use edgemap_pipeline::{Grid, Pipeline, PipelineConfig, PipelineError};
/// # use edgemap_pipeline::pipeline::{Stage, PipelineStage};
/// # fn run(intensity: Grid<f64>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(intensity, PipelineConfig::default())?.into();
/// while let Some(next) = stage.next() {
///     println!("{}: {:?}", next.name(), next.metrics());
///     if next.is_complete() {
///         let result = next.complete();
///         break;
///     }
///     stage = next;
/// }
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"smooth"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `5` for
    /// Linked).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics describing the work done to reach this
    /// state.
    fn metrics(&self) -> StageMetrics;

    /// Advance to the next stage, or `None` if already at the final one.
    fn next(self) -> Option<Stage>;

    /// Run all remaining stages and return the final [`StagedResult`].
    fn complete(self) -> StagedResult;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            intensity: &self.intensity,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Source {
            width: self.intensity.width(),
            height: self.intensity.height(),
            mean_intensity: grid_mean(&self.intensity),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Smoothed(self.smooth()))
    }

    fn complete(self) -> StagedResult {
        self.smooth().complete()
    }
}

impl PipelineStage for Smoothed {
    const NAME: &str = "smooth";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Smoothed {
            smoothed: &self.smoothed,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Smooth {
            mean_intensity: grid_mean(&self.smoothed),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::GradientEstimated(self.estimate_gradient()))
    }

    fn complete(self) -> StagedResult {
        self.estimate_gradient().complete()
    }
}

impl PipelineStage for GradientEstimated {
    const NAME: &str = "gradient";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Gradient {
            magnitude: &self.gradient.magnitude,
            orientation: &self.gradient.orientation,
        }
    }

    fn metrics(&self) -> StageMetrics {
        let mut histogram = [0; 4];
        for o in self.gradient.orientation.iter() {
            histogram[o.index()] += 1;
        }
        StageMetrics::Gradient {
            max_magnitude: self.gradient.magnitude.iter().copied().fold(0.0, f64::max),
            orientation_histogram: histogram,
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Suppressed(self.suppress()))
    }

    fn complete(self) -> StagedResult {
        self.suppress().complete()
    }
}

impl PipelineStage for Suppressed {
    const NAME: &str = "suppress";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Suppressed {
            suppressed: &self.suppressed,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Suppression {
            survivor_count: self.suppressed.iter().filter(|&&m| m > 0.0).count(),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Thresholded(self.threshold()))
    }

    fn complete(self) -> StagedResult {
        self.threshold().complete()
    }
}

impl PipelineStage for Thresholded {
    const NAME: &str = "threshold";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Thresholded {
            edge_states: &self.edge_states,
            thresholds: self.thresholds,
        }
    }

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Threshold {
            lower: self.thresholds.lower(),
            higher: self.thresholds.higher(),
            strong_count: count(&self.edge_states, EdgeState::Strong),
            weak_count: count(&self.edge_states, EdgeState::Weak),
        }
    }

    fn next(self) -> Option<Stage> {
        Some(Stage::Linked(self.link()))
    }

    fn complete(self) -> StagedResult {
        self.link().complete()
    }
}

impl PipelineStage for Linked {
    const NAME: &str = "link";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Linked { edges: &self.edges }
    }

    fn metrics(&self) -> StageMetrics {
        let edge_pixel_count = count_edges(&self.edges);
        let strong = count(&self.edge_states, EdgeState::Strong);
        StageMetrics::Hysteresis {
            promoted_count: edge_pixel_count.saturating_sub(strong),
            edge_pixel_count,
            total_pixel_count: self.edges.len(),
        }
    }

    fn next(self) -> Option<Stage> {
        None
    }

    fn complete(self) -> StagedResult {
        self.into_result()
    }
}

/// Enum wrapping every pipeline stage for uniform, loopable access.
///
/// ```rust
/// # use edgemap_pipeline::{Grid, Pipeline, PipelineConfig, PipelineError};
/// # use edgemap_pipeline::pipeline::{Advance, Stage};
/// # fn run(intensity: Grid<f64>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(intensity, PipelineConfig::default())?.into();
/// loop {
///     match stage.advance() {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete();
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Smoothed`].
    Smoothed(Smoothed),
    /// See [`GradientEstimated`].
    GradientEstimated(GradientEstimated),
    /// See [`Suppressed`].
    Suppressed(Suppressed),
    /// See [`Thresholded`].
    Thresholded(Thresholded),
    /// See [`Linked`].
    Linked(Linked),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Smoothed(_)
        | Stage::GradientEstimated(_)
        | Stage::Suppressed(_)
        | Stage::Thresholded(_)
        | Stage::Linked(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the final
/// stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this stage.
    Next(Stage),
    /// Already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident) => {
        match $self {
            Self::Pending(s) => s.$method(),
            Self::Smoothed(s) => s.$method(),
            Self::GradientEstimated(s) => s.$method(),
            Self::Suppressed(s) => s.$method(),
            Self::Thresholded(s) => s.$method(),
            Self::Linked(s) => s.$method(),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending(_) => Pending::NAME,
            Self::Smoothed(_) => Smoothed::NAME,
            Self::GradientEstimated(_) => GradientEstimated::NAME,
            Self::Suppressed(_) => Suppressed::NAME,
            Self::Thresholded(_) => Thresholded::NAME,
            Self::Linked(_) => Linked::NAME,
        }
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Pending(_) => Pending::INDEX,
            Self::Smoothed(_) => Smoothed::INDEX,
            Self::GradientEstimated(_) => GradientEstimated::INDEX,
            Self::Suppressed(_) => Suppressed::INDEX,
            Self::Thresholded(_) => Thresholded::INDEX,
            Self::Linked(_) => Linked::INDEX,
        }
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Linked(_))
    }

    /// Advance to the next stage.
    ///
    /// Returns `None` if already complete; the `Linked` value is consumed.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if already
    /// complete so [`complete`](Self::complete) can still be called.
    pub fn advance(self) -> Advance {
        match self {
            Self::Pending(s) => Advance::Next(Self::Smoothed(s.smooth())),
            Self::Smoothed(s) => Advance::Next(Self::GradientEstimated(s.estimate_gradient())),
            Self::GradientEstimated(s) => Advance::Next(Self::Suppressed(s.suppress())),
            Self::Suppressed(s) => Advance::Next(Self::Thresholded(s.threshold())),
            Self::Thresholded(s) => Advance::Next(Self::Linked(s.link())),
            Self::Linked(s) => Advance::Complete(Self::Linked(s)),
        }
    }

    /// Run all remaining stages.
    #[must_use]
    pub fn complete(self) -> StagedResult {
        delegate!(self, complete)
    }
}

impl From<Pending> for Stage {
    fn from(stage: Pending) -> Self {
        Self::Pending(stage)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn step_grid() -> Grid<f64> {
        Grid::from_fn(16, 12, |x, _| if x < 8 { 0.0 } else { 1.0 })
    }

    #[test]
    fn empty_grid_rejected() {
        let result = Pipeline::new(Grid::filled(0, 5, 0.0), PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn zero_width_grid_from_fn_rejected() {
        let grid = Grid::from_fn(0, 8, |_, _| 1.0);
        let result = Pipeline::new(grid, PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let config = PipelineConfig {
            lower: 0.6,
            higher: 0.1,
        };
        let result = Pipeline::new(step_grid(), config);
        assert!(matches!(result, Err(PipelineError::InvalidConfiguration(_))));
    }

    #[test]
    fn every_stage_preserves_shape() {
        let pending = Pipeline::new(step_grid(), PipelineConfig::default()).unwrap();
        let smoothed = pending.smooth();
        assert!(step_grid().same_shape(smoothed.smoothed()));
        let gradient = smoothed.estimate_gradient();
        assert!(step_grid().same_shape(&gradient.gradient().magnitude));
        assert!(step_grid().same_shape(&gradient.gradient().orientation));
        let suppressed = gradient.suppress();
        assert!(step_grid().same_shape(suppressed.suppressed()));
        let thresholded = suppressed.threshold();
        assert!(step_grid().same_shape(thresholded.edge_states()));
        assert!(step_grid().same_shape(&thresholded.edge_state_values()));
        let linked = thresholded.link();
        assert!(step_grid().same_shape(linked.edges()));
    }

    #[test]
    fn edge_state_values_use_weak_marker() {
        let config = PipelineConfig::default();
        let thresholded = Pipeline::new(step_grid(), config)
            .unwrap()
            .smooth()
            .estimate_gradient()
            .suppress()
            .threshold();
        let weak = (config.lower + config.higher) / 2.0;
        for v in thresholded.edge_state_values().iter() {
            assert!(
                v.abs() < f64::EPSILON
                    || (v - 1.0).abs() < f64::EPSILON
                    || (v - weak).abs() < 1e-15
            );
        }
    }

    #[test]
    fn stage_iteration_visits_every_stage_in_order() {
        let mut stage: Stage = Pipeline::new(step_grid(), PipelineConfig::default())
            .unwrap()
            .into();
        let mut names = vec![stage.name()];
        loop {
            let index = stage.index();
            match stage.advance() {
                Advance::Next(next) => {
                    assert_eq!(next.index(), index + 1);
                    names.push(next.name());
                    stage = next;
                }
                Advance::Complete(done) => {
                    assert!(done.is_complete());
                    break;
                }
            }
        }
        assert_eq!(
            names,
            ["source", "smooth", "gradient", "suppress", "threshold", "link"]
        );
        assert_eq!(names.len(), STAGE_COUNT);
    }

    #[test]
    fn complete_from_any_stage_matches_full_run() {
        let full = Pipeline::new(step_grid(), PipelineConfig::default())
            .unwrap()
            .complete();
        let partial = Pipeline::new(step_grid(), PipelineConfig::default())
            .unwrap()
            .smooth()
            .estimate_gradient()
            .complete();
        assert_eq!(full, partial);
    }

    #[test]
    fn linked_metrics_account_for_promotions() {
        let stage = Pipeline::new(step_grid(), PipelineConfig::default())
            .unwrap()
            .smooth()
            .estimate_gradient()
            .suppress()
            .threshold()
            .link();
        let metrics = stage.metrics();
        assert!(
            matches!(
                metrics,
                StageMetrics::Hysteresis {
                    edge_pixel_count,
                    total_pixel_count,
                    ..
                } if edge_pixel_count > 0 && total_pixel_count == 16 * 12
            ),
            "{metrics:?}"
        );
    }
}
