//! Pipeline diagnostics: timing and counts for each stage.
//!
//! Duration measurements use [`std::time::Duration`]. Timestamps come
//! from a caller-supplied [`Clock`] so the pipeline itself never reads a
//! system timer; [`WebClock`] is the default implementation backed by the
//! `web-time` crate.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineConfig, PipelineError, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Capture the current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding and intensity conversion.
    pub decode: StageDiagnostics,
    /// Stage 1: 5×5 smoothing.
    pub smooth: StageDiagnostics,
    /// Stage 2: Sobel gradient estimation.
    pub gradient: StageDiagnostics,
    /// Stage 3: non-maximum suppression.
    pub suppression: StageDiagnostics,
    /// Stage 4: double thresholding.
    pub threshold: StageDiagnostics,
    /// Stage 5: hysteresis linking.
    pub hysteresis: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Source intensity grid.
    Source {
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
        /// Mean intensity.
        mean_intensity: f64,
    },
    /// Smoothing.
    Smooth {
        /// Mean intensity after smoothing.
        mean_intensity: f64,
    },
    /// Gradient estimation.
    Gradient {
        /// Largest gradient magnitude.
        max_magnitude: f64,
        /// Pixel counts per orientation, indexed 0°, 45°, 90°, 135°.
        orientation_histogram: [usize; 4],
    },
    /// Non-maximum suppression.
    Suppression {
        /// Pixels with a non-zero magnitude after suppression.
        survivor_count: usize,
    },
    /// Double thresholding.
    Threshold {
        /// Lower threshold.
        lower: f64,
        /// Higher threshold.
        higher: f64,
        /// Pixels classified strong.
        strong_count: usize,
        /// Pixels classified weak.
        weak_count: usize,
    },
    /// Hysteresis linking.
    Hysteresis {
        /// Weak pixels promoted to edges.
        promoted_count: usize,
        /// Edge pixels in the final map.
        edge_pixel_count: usize,
        /// Total pixels in the map.
        total_pixel_count: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source width in pixels.
    pub width: usize,
    /// Source height in pixels.
    pub height: usize,
    /// Total pixel count.
    pub pixel_count: usize,
    /// Edge pixels in the final map.
    pub edge_pixel_count: usize,
}

impl PipelineDiagnostics {
    /// Per-stage diagnostics in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Decode", &self.decode),
            ("Smooth", &self.smooth),
            ("Gradient", &self.gradient),
            ("Suppression", &self.suppression),
            ("Threshold", &self.threshold),
            ("Hysteresis", &self.hysteresis),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.width, self.summary.height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Edge pixels: {}", self.summary.edge_pixel_count));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Source {
            width,
            height,
            mean_intensity,
        } => format!("{width}x{height} mean={mean_intensity:.4}"),
        StageMetrics::Smooth { mean_intensity } => format!("mean={mean_intensity:.4}"),
        StageMetrics::Gradient {
            max_magnitude,
            orientation_histogram: [d0, d45, d90, d135],
        } => format!("max={max_magnitude:.4} 0°={d0} 45°={d45} 90°={d90} 135°={d135}"),
        StageMetrics::Suppression { survivor_count } => format!("survivors={survivor_count}"),
        StageMetrics::Threshold {
            lower,
            higher,
            strong_count,
            weak_count,
        } => format!("lower={lower:.4} higher={higher:.4} strong={strong_count} weak={weak_count}"),
        StageMetrics::Hysteresis {
            promoted_count,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("promoted={promoted_count} edges={edge_pixel_count} ({density:.1}%)")
        }
    }
}

/// Arithmetic mean of a grid, `0.0` when empty.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn grid_mean(grid: &Grid<f64>) -> f64 {
    if grid.is_empty() {
        return 0.0;
    }
    grid.iter().sum::<f64>() / grid.len() as f64
}

/// Run the pipeline on raw image bytes, timing every stage.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if decoding fails.
/// Returns [`PipelineError::InvalidConfiguration`] if the thresholds are
/// invalid.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();

    let start = clock.now();
    let pending = Pipeline::new(crate::grayscale::decode(image_bytes)?, *config)?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: pending.metrics(),
    };

    let start = clock.now();
    let smoothed = pending.smooth();
    let smooth = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: smoothed.metrics(),
    };

    let start = clock.now();
    let estimated = smoothed.estimate_gradient();
    let gradient = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: estimated.metrics(),
    };

    let start = clock.now();
    let suppressed = estimated.suppress();
    let suppression = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: suppressed.metrics(),
    };

    let start = clock.now();
    let thresholded = suppressed.threshold();
    let threshold = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: thresholded.metrics(),
    };

    let start = clock.now();
    let linked = thresholded.link();
    let hysteresis = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: linked.metrics(),
    };

    let staged = linked.into_result();
    let total_duration = clock.elapsed(&total_start);

    let summary = PipelineSummary {
        width: staged.dimensions.width,
        height: staged.dimensions.height,
        pixel_count: staged.dimensions.pixel_count(),
        edge_pixel_count: crate::hysteresis::count_edges(&staged.edges),
    };
    tracing::info!(
        edge_pixels = summary.edge_pixel_count,
        total_ms = duration_ms(total_duration),
        "pipeline complete"
    );

    Ok((
        staged,
        PipelineDiagnostics {
            decode,
            smooth,
            gradient,
            suppression,
            threshold,
            hysteresis,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn step_png() -> Vec<u8> {
        let img = image::RgbaImage::from_fn(24, 16, |x, _| {
            if x < 12 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn diagnostics() -> PipelineDiagnostics {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            process_staged_with_diagnostics(&step_png(), &PipelineConfig::default(), &clock)
                .unwrap();
        diag
    }

    #[test]
    fn every_stage_is_timed() {
        let diag = diagnostics();
        for (name, stage) in diag.stages() {
            assert_eq!(stage.duration, Duration::from_millis(1), "{name}");
        }
        assert!(diag.total_duration >= Duration::from_millis(6));
    }

    #[test]
    fn summary_matches_source() {
        let diag = diagnostics();
        assert_eq!(diag.summary.width, 24);
        assert_eq!(diag.summary.height, 16);
        assert_eq!(diag.summary.pixel_count, 24 * 16);
        assert!(diag.summary.edge_pixel_count > 0);
    }

    #[test]
    fn orientation_histogram_covers_every_pixel() {
        let diag = diagnostics();
        assert!(
            matches!(
                diag.gradient.metrics,
                StageMetrics::Gradient {
                    orientation_histogram,
                    ..
                } if orientation_histogram.iter().sum::<usize>() == 24 * 16
            ),
            "{:?}",
            diag.gradient.metrics
        );
    }

    #[test]
    fn report_produces_nonempty_string() {
        let report = diagnostics().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Hysteresis"));
        assert!(report.contains("24x16"));
    }

    #[test]
    fn diagnostics_roundtrip_json() {
        let diag = diagnostics();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.edge_pixel_count, diag.summary.edge_pixel_count);
        assert_eq!(back.threshold.metrics, diag.threshold.metrics);
        assert_eq!(back.smooth.duration, diag.smooth.duration);
    }

    #[test]
    fn empty_input_propagates() {
        let result =
            process_staged_with_diagnostics(&[], &PipelineConfig::default(), &WebClock);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn grid_mean_of_uniform_grid() {
        let grid = Grid::filled(3, 3, 0.25);
        assert!((grid_mean(&grid) - 0.25).abs() < 1e-12);
    }
}
