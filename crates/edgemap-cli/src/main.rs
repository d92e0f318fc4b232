//! edgemap: detect edges in an image file and write a binary edge map.
//!
//! Runs the Canny pipeline on the given image, prints per-stage
//! diagnostics, and optionally writes the edge map (white edges on black)
//! and every intermediate stage as PNG files.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin edgemap -- [OPTIONS] <INPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use edgemap_pipeline::diagnostics::{
    PipelineDiagnostics, WebClock, process_staged_with_diagnostics,
};
use edgemap_pipeline::pipeline::{Advance, Stage, StageOutput};
use edgemap_pipeline::{GrayImage, Grid, Pipeline, PipelineConfig, PipelineError, grayscale};

/// Binary edge maps from images with the classical Canny pipeline.
///
/// Thresholds are on the normalized 0.0–1.0 intensity scale.
#[derive(Parser)]
#[command(name = "edgemap", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Write the edge map as a PNG to this path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Lower (weak) threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_LOWER)]
    lower: f64,

    /// Higher (strong) threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HIGHER)]
    higher: f64,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--lower` and `--higher` are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Write every intermediate stage as a PNG into this directory.
    #[arg(long)]
    stages_dir: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` wins over the individual threshold flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(PipelineConfig {
        lower: cli.lower,
        higher: cli.higher,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        path = %cli.input.display(),
        bytes = image_bytes.len(),
        lower = config.lower,
        higher = config.higher,
        runs = cli.runs,
        "loaded image"
    );

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            tracing::info!("run {}/{}", run + 1, cli.runs);
        }

        let (staged, diagnostics) =
            match process_staged_with_diagnostics(&image_bytes, &config, &WebClock) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Pipeline error: {e}");
                    return ExitCode::FAILURE;
                }
            };

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Write images on the first run only.
        if run == 0
            && let Some(ref output) = cli.output
            && let Err(e) = write_edge_map(&staged.edges, output)
        {
            eprintln!("Error writing {}: {e}", output.display());
            return ExitCode::FAILURE;
        }

        all_diagnostics.push(diagnostics);
    }

    if let Some(ref dir) = cli.stages_dir
        && let Err(e) = write_stages(&image_bytes, &config, dir)
    {
        eprintln!("Error writing stages to {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Errors from writing images to disk.
#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

fn write_edge_map(edges: &Grid<u8>, path: &Path) -> Result<(), WriteError> {
    let img = grayscale::edge_map_to_image(edges)?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    tracing::info!(path = %path.display(), "edge map written");
    Ok(())
}

/// Re-run the pipeline one stage at a time, writing each output as
/// `<index>-<name>.png` into `dir`.
fn write_stages(
    image_bytes: &[u8],
    config: &PipelineConfig,
    dir: &Path,
) -> Result<(), WriteError> {
    std::fs::create_dir_all(dir)?;
    let intensity = grayscale::decode(image_bytes)?;
    let mut stage: Stage = Pipeline::new(intensity, *config)?.into();
    loop {
        let path = dir.join(format!("{}-{}.png", stage.index(), stage.name()));
        render_stage(&stage.output())?.save_with_format(&path, image::ImageFormat::Png)?;
        tracing::debug!(path = %path.display(), "stage written");
        match stage.advance() {
            Advance::Next(next) => stage = next,
            Advance::Complete(_) => break,
        }
    }
    tracing::info!(dir = %dir.display(), "stages written");
    Ok(())
}

/// Render a stage output for viewing.
///
/// Scalar grids are stretched so their maximum maps to white; edge states
/// use their numeric values directly.
fn render_stage(output: &StageOutput<'_>) -> Result<GrayImage, PipelineError> {
    match *output {
        StageOutput::Source { intensity: grid }
        | StageOutput::Smoothed { smoothed: grid }
        | StageOutput::Gradient {
            magnitude: grid, ..
        }
        | StageOutput::Suppressed { suppressed: grid } => {
            let max = grid.iter().copied().fold(0.0, f64::max);
            let scale = if max > 0.0 { 1.0 / max } else { 0.0 };
            grayscale::intensity_to_image(&grid.map(|&v| v * scale))
        }
        StageOutput::Thresholded {
            edge_states,
            thresholds,
        } => grayscale::intensity_to_image(&edge_states.map(|s| s.value(thresholds))),
        StageOutput::Linked { edges } => grayscale::edge_map_to_image(edges),
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let names = all_diagnostics[0].stages().map(|(name, _)| name);
    for (i, name) in names.iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[i].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("edgemap").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn default_thresholds_come_from_pipeline_config() {
        let config = config_from_cli(&parse(&["in.png"])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn threshold_flags_override_defaults() {
        let cli = parse(&["in.png", "--lower", "0.1", "--higher", "0.4"]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.lower - 0.1).abs() < f64::EPSILON);
        assert!((config.higher - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn config_json_wins_over_flags() {
        let cli = parse(&[
            "in.png",
            "--lower",
            "0.1",
            "--config-json",
            r#"{"lower":0.25,"higher":0.75}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.lower - 0.25).abs() < f64::EPSILON);
        assert!((config.higher - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = parse(&["in.png", "--config-json", "{not json"]);
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn zero_runs_rejected() {
        assert!(Cli::try_parse_from(["edgemap", "in.png", "--runs", "0"]).is_err());
    }

    #[test]
    fn every_stage_renders_at_source_size() {
        let intensity = Grid::from_fn(12, 9, |x, _| if x < 6 { 0.0 } else { 1.0 });
        let mut stage: Stage = Pipeline::new(intensity, PipelineConfig::default())
            .unwrap()
            .into();
        loop {
            let img = render_stage(&stage.output()).unwrap();
            assert_eq!(img.dimensions(), (12, 9), "{}", stage.name());
            match stage.advance() {
                Advance::Next(next) => stage = next,
                Advance::Complete(_) => break,
            }
        }
    }

    #[test]
    fn scalar_render_stretches_to_white() {
        let grid = Grid::from_fn(2, 1, |x, _| [0.0, 0.25][x]);
        let img = render_stage(&StageOutput::Source { intensity: &grid }).unwrap();
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 255);
    }
}
