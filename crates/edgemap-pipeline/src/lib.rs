//! edgemap-pipeline: Canny edge detection over grayscale grids (sans-IO).
//!
//! Turns a normalized intensity grid into a binary edge map through:
//! smoothing -> gradient estimation -> non-maximum suppression ->
//! double thresholding -> hysteresis linking.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory grids
//! and byte slices and returns structured data. Reading and writing files
//! lives in `edgemap-cli`.

pub mod diagnostics;
pub mod gradient;
pub mod grayscale;
pub mod grid;
pub mod hysteresis;
pub mod pipeline;
pub mod smooth;
pub mod suppress;
pub mod threshold;
pub mod types;

pub use gradient::{Gradient, Orientation};
pub use grid::Grid;
pub use pipeline::Pipeline;
pub use threshold::{EdgeState, Thresholds};
pub use types::{
    Dimensions, GrayImage, PipelineConfig, PipelineError, ProcessResult, StagedResult,
};

/// Run every stage on an intensity grid and return the binary edge map.
///
/// The input is left untouched; the result has the same dimensions with
/// 1 marking edge pixels and 0 everywhere else.
///
/// # Pipeline steps
///
/// 1. 5×5 smoothing with zero padding
/// 2. Sobel gradient magnitude and quantized orientation
/// 3. Non-maximum suppression along the orientation
/// 4. Double thresholding into strong/weak/none
/// 5. Hysteresis linking and binary collapse
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the grid is empty.
/// Returns [`PipelineError::InvalidConfiguration`] if the thresholds are
/// not finite or `lower > higher`.
pub fn detect_edges(
    intensity: &Grid<f64>,
    config: &PipelineConfig,
) -> Result<Grid<u8>, PipelineError> {
    let linked = Pipeline::new(intensity.clone(), *config)?
        .smooth()
        .estimate_gradient()
        .suppress()
        .threshold()
        .link();
    Ok(linked.into_result().edges)
}

/// Decode raw image bytes and detect edges.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::InvalidConfiguration`] if the thresholds are
/// invalid.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    let intensity = grayscale::decode(image_bytes)?;
    let dimensions = intensity.dimensions();
    let edges = detect_edges(&intensity, config)?;
    Ok(ProcessResult { edges, dimensions })
}

/// Decode raw image bytes and run the pipeline, keeping every
/// intermediate grid.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    let intensity = grayscale::decode(image_bytes)?;
    Ok(Pipeline::new(intensity, *config)?
        .smooth()
        .estimate_gradient()
        .suppress()
        .threshold()
        .link()
        .into_result())
}
