//! Scaling and writing delivered bitmaps.
//!
//! Upscales use nearest-neighbour so pixel-art edges stay hard; downscales
//! and 1x use Lanczos3 to avoid aliasing.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{PipelineError, Result};
use crate::image_bridge::Bitmap;

pub const SCALE_PRESETS: [f32; 5] = [0.5, 1.0, 2.0, 4.0, 8.0];

/// Returns the preset `scale` names, or `InvalidParameters` for anything
/// else. Arbitrary factors are refused so the target size stays bounded.
pub fn preset_scale(scale: f32) -> Result<f32> {
    SCALE_PRESETS
        .into_iter()
        .find(|preset| (preset - scale).abs() < 1e-6)
        .ok_or_else(|| {
            PipelineError::InvalidParameters(format!(
                "export scale must be one of {}, got {scale}",
                preset_list()
            ))
        })
}

/// `0.5, 1, 2, 4, 8`
pub fn preset_list() -> String {
    SCALE_PRESETS
        .iter()
        .map(|preset| preset.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn filter_for(scale: f32) -> FilterType {
    if scale > 1.0 {
        FilterType::Nearest
    } else {
        FilterType::Lanczos3
    }
}

/// Target size for `scale`, truncated, never below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let side = |value: u32| ((value as f32 * scale) as u32).max(1);
    (side(width), side(height))
}

pub fn scaled(bitmap: &Bitmap, scale: f32) -> Result<RgbaImage> {
    let scale = preset_scale(scale)?;
    let image = bitmap.to_rgba_image().ok_or_else(|| {
        PipelineError::InvalidParameters(format!(
            "bitmap holds {} bytes, expected {}x{}x4",
            bitmap.pixels.len(),
            bitmap.width,
            bitmap.height
        ))
    })?;

    let (width, height) = scaled_dimensions(bitmap.width, bitmap.height, scale);
    if (width, height) == image.dimensions() {
        return Ok(image);
    }
    Ok(imageops::resize(&image, width, height, filter_for(scale)))
}

/// Scale `bitmap` and write it as PNG. Returns the written dimensions.
pub fn write_png(bitmap: &Bitmap, scale: f32, path: &Path) -> Result<(u32, u32)> {
    let image = scaled(bitmap, scale)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| PipelineError::export(path, error))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|error| PipelineError::export(path, error))?;
    tracing::debug!(path = %path.display(), scale, "exported bitmap");
    Ok(image.dimensions())
}

/// `<stem>_x<scale>.png`, scale truncated to an integer. Callers join it
/// onto their output directory.
pub fn default_file_name(source: &Path, scale: f32) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    PathBuf::from(format!("{stem}_x{}.png", scale as u32))
}
