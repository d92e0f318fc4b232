//! Image decoding and conversion between `image` rasters and grids.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces a
//! normalized intensity grid (0.0–1.0) for the edge detection stages.
//! Also renders grids back to a `GrayImage` so callers can write them out.

use image::{DynamicImage, GrayImage, Luma};

use crate::grid::Grid;
use crate::hysteresis::EDGE;
use crate::types::PipelineError;

/// Channel weights `(R, G, B)` applied to normalized samples.
pub const CHANNEL_WEIGHTS: [f64; 3] = [0.11, 0.59, 0.3];

/// Decode raw image bytes into a normalized intensity grid.
///
/// Color images are reduced with [`CHANNEL_WEIGHTS`]; alpha is ignored.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::InvalidInput`] if the decoded image has a
/// zero dimension.
pub fn decode(bytes: &[u8]) -> Result<Grid<f64>, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    let grid = intensity_from_image(&img)?;
    tracing::debug!(
        width = grid.width(),
        height = grid.height(),
        "decoded intensity grid"
    );
    Ok(grid)
}

/// Convert any decoded image into a normalized intensity grid.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has a zero
/// dimension.
pub fn intensity_from_image(img: &DynamicImage) -> Result<Grid<f64>, PipelineError> {
    let rgb = img.to_rgb32f();
    let [wr, wg, wb] = CHANNEL_WEIGHTS;
    let data = rgb
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0.map(f64::from);
            r * wr + g * wg + b * wb
        })
        .collect();
    Grid::new(rgb.width() as usize, rgb.height() as usize, data)
}

/// Convert an 8-bit grayscale image into a grid normalized by 255.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if the image has a zero
/// dimension.
pub fn from_gray_image(img: &GrayImage) -> Result<Grid<f64>, PipelineError> {
    let data = img.pixels().map(|p| f64::from(p.0[0]) / 255.0).collect();
    Grid::new(img.width() as usize, img.height() as usize, data)
}

/// Render a binary edge map as white (255) edges on black (0).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if a dimension exceeds
/// `u32::MAX`.
pub fn edge_map_to_image(edges: &Grid<u8>) -> Result<GrayImage, PipelineError> {
    to_gray_image(edges, |v| if v == EDGE { 255 } else { 0 })
}

/// Render a 0.0–1.0 grid as 8-bit luma, clamping values outside the range.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] if a dimension exceeds
/// `u32::MAX`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn intensity_to_image(grid: &Grid<f64>) -> Result<GrayImage, PipelineError> {
    to_gray_image(grid, |v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn to_gray_image<T: Copy>(
    grid: &Grid<T>,
    luma: impl Fn(T) -> u8,
) -> Result<GrayImage, PipelineError> {
    let too_large = |_| {
        PipelineError::InvalidInput(format!("{}x{} grid too large", grid.width(), grid.height()))
    };
    let width = u32::try_from(grid.width()).map_err(too_large)?;
    let height = u32::try_from(grid.height()).map_err(too_large)?;
    Ok(GrayImage::from_fn(width, height, |x, y| {
        Luma([luma(grid[(x as usize, y as usize)])])
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGBA image as a PNG byte buffer.
    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
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

    fn rgba_pixel(r: u8, g: u8, b: u8) -> Vec<u8> {
        encode_png(&image::RgbaImage::from_fn(1, 1, |_, _| {
            image::Rgba([r, g, b, 255])
        }))
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn white_png_decodes_to_one() {
        let png = encode_png(&image::RgbaImage::from_fn(2, 2, |_, _| {
            image::Rgba([255, 255, 255, 255])
        }));
        let grid = decode(&png).unwrap();
        for &v in grid.iter() {
            assert!((v - 1.0).abs() < 1e-6, "expected 1.0, got {v}");
        }
    }

    #[test]
    fn output_dimensions_match_input() {
        let png = encode_png(&image::RgbaImage::from_fn(17, 31, |_, _| {
            image::Rgba([128, 64, 32, 255])
        }));
        let grid = decode(&png).unwrap();
        assert_eq!(grid.width(), 17);
        assert_eq!(grid.height(), 31);
    }

    #[test]
    fn channels_use_fixed_weights() {
        let r = decode(&rgba_pixel(255, 0, 0)).unwrap()[(0, 0)];
        let g = decode(&rgba_pixel(0, 255, 0)).unwrap()[(0, 0)];
        let b = decode(&rgba_pixel(0, 0, 255)).unwrap()[(0, 0)];
        assert!((r - CHANNEL_WEIGHTS[0]).abs() < 1e-6, "red -> {r}");
        assert!((g - CHANNEL_WEIGHTS[1]).abs() < 1e-6, "green -> {g}");
        assert!((b - CHANNEL_WEIGHTS[2]).abs() < 1e-6, "blue -> {b}");
    }

    #[test]
    fn gray_image_normalized_by_255() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 51, 255][x as usize]]));
        let grid = from_gray_image(&img).unwrap();
        assert!(grid[(0, 0)].abs() < f64::EPSILON);
        assert!((grid[(1, 0)] - 0.2).abs() < 1e-12);
        assert!((grid[(2, 0)] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_gray_image_is_invalid_input() {
        let result = from_gray_image(&GrayImage::new(0, 4));
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn edge_map_renders_white_edges() {
        let edges = Grid::from_fn(3, 2, |x, y| u8::from(x == y));
        let img = edge_map_to_image(&edges).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0[0], 255);
        assert_eq!(img.get_pixel(1, 1).0[0], 255);
        assert_eq!(img.get_pixel(2, 0).0[0], 0);
    }

    #[test]
    fn intensity_render_clamps_and_scales() {
        let grid = Grid::from_fn(4, 1, |x, _| [-0.5, 0.0, 0.2, 1.5][x]);
        let img = intensity_to_image(&grid).unwrap();
        let row: Vec<u8> = (0..4).map(|x| img.get_pixel(x, 0).0[0]).collect();
        assert_eq!(row, [0, 0, 51, 255]);
    }
}
