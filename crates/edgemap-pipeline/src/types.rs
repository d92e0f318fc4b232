//! Shared types for the edgemap pipeline.

use serde::{Deserialize, Serialize};

use crate::gradient::Orientation;
use crate::grid::Grid;
use crate::threshold::{EdgeState, Thresholds};

/// Re-export `GrayImage` so downstream crates can render edge maps
/// without depending on `image` directly.
pub use image::GrayImage;

/// Grid dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl Dimensions {
    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width * self.height
    }
}

/// Configuration for the edge detection pipeline.
///
/// The two thresholds are compared against suppressed gradient
/// magnitudes, which live on the same scale as the input intensities
/// (normalized to 0.0–1.0 by [`crate::grayscale`]).
///
/// Fields are public for ergonomic construction; call
/// [`validate`](Self::validate) (or go through [`crate::Pipeline::new`],
/// which does) before relying on them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Magnitudes at or above this value (and not above `higher`) are
    /// weak edges, kept only when connected to a strong edge.
    pub lower: f64,

    /// Magnitudes strictly above this value are strong edges.
    pub higher: f64,
}

impl PipelineConfig {
    /// Default lower hysteresis threshold (20 on an 8-bit scale).
    pub const DEFAULT_LOWER: f64 = 20.0 / 255.0;

    /// Default higher hysteresis threshold (80 on an 8-bit scale).
    pub const DEFAULT_HIGHER: f64 = 80.0 / 255.0;

    /// Check the thresholds and return them as a validated pair.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if either threshold
    /// is not finite or `lower > higher`.
    pub fn validate(&self) -> Result<Thresholds, PipelineError> {
        Thresholds::new(self.lower, self.higher)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lower: Self::DEFAULT_LOWER,
            higher: Self::DEFAULT_HIGHER,
        }
    }
}

/// Output of [`crate::process`]: the binary edge map plus the source
/// dimensions exporters need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Binary edge map (1 = edge, 0 = background).
    pub edges: Grid<u8>,
    /// Source dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with every intermediate grid kept.
///
/// Each field is the output of one stage, all sharing the source
/// [`Dimensions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedResult {
    /// Stage 0: source intensity grid.
    pub intensity: Grid<f64>,
    /// Stage 1: 5×5 smoothed intensity.
    pub smoothed: Grid<f64>,
    /// Stage 2: gradient magnitude.
    pub magnitude: Grid<f64>,
    /// Stage 2: quantized gradient orientation.
    pub orientation: Grid<Orientation>,
    /// Stage 3: magnitude after non-maximum suppression.
    pub suppressed: Grid<f64>,
    /// Stage 4: none/weak/strong classification before linking.
    pub edge_states: Grid<EdgeState>,
    /// Stage 5: final binary edge map (1 = edge, 0 = background).
    pub edges: Grid<u8>,
    /// Thresholds the run used.
    pub thresholds: Thresholds,
    /// Source dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The intensity grid is empty or malformed.
    #[error("invalid input grid: {0}")]
    InvalidInput(String),

    /// Thresholds are out of order or not finite.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfiguration(String),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidInput(String),
    InvalidConfiguration(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidInput(s) => PipelineErrorProxy::InvalidInput(s.clone()),
            Self::InvalidConfiguration(s) => PipelineErrorProxy::InvalidConfiguration(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image::ImageError cannot be rebuilt; keep the message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidInput(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidInput(s) => Self::InvalidInput(s),
            PipelineErrorProxy::InvalidConfiguration(s) => Self::InvalidConfiguration(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert!((config.lower - 20.0 / 255.0).abs() < f64::EPSILON);
        assert!((config.higher - 80.0 / 255.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_lower_above_higher() {
        let config = PipelineConfig {
            lower: 0.5,
            higher: 0.2,
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn validate_rejects_nan() {
        let config = PipelineConfig {
            lower: f64::NAN,
            higher: 0.2,
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"higher": 0.5}"#).unwrap();
        assert!((config.lower - PipelineConfig::DEFAULT_LOWER).abs() < f64::EPSILON);
        assert!((config.higher - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn dimensions_pixel_count() {
        let dims = Dimensions {
            width: 7,
            height: 3,
        };
        assert_eq!(dims.pixel_count(), 21);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::InvalidConfiguration("lower > higher".to_string()).to_string(),
            "invalid pipeline configuration: lower > higher",
        );
        assert_eq!(
            PipelineError::InvalidInput("grid must be non-empty".to_string()).to_string(),
            "invalid input grid: grid must be non-empty",
        );
    }

    #[test]
    fn error_serde_round_trip() {
        let err = PipelineError::InvalidConfiguration("bad".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::InvalidConfiguration(ref s) if s == "bad"));

        let json = serde_json::to_string(&PipelineError::EmptyInput).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::EmptyInput));
    }

    #[test]
    fn image_decode_error_deserializes_with_message() {
        let bytes = [0xFF_u8, 0x00];
        let err = PipelineError::from(image::load_from_memory(&bytes).unwrap_err());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::InvalidInput(ref s) if s.starts_with("image decode error")
        ));
    }
}
