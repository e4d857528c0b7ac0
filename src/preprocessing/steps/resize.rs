use crate::error::OcrError;
use image::{imageops::FilterType, DynamicImage};

/// Scans without DPI metadata are treated as screen resolution
const ASSUMED_INPUT_DPI: f32 = 72.0;
const TARGET_DPI: f32 = 300.0;
const MAX_DIMENSION: u32 = 4000;
const MIN_DIMENSION: u32 = 300;

/// Compute the output size for a source image
fn target_size(width: u32, height: u32) -> (u32, u32) {
    let mut scale = TARGET_DPI / ASSUMED_INPUT_DPI;

    let longest = width.max(height) as f32 * scale;
    if longest > MAX_DIMENSION as f32 {
        scale *= MAX_DIMENSION as f32 / longest;
    }

    let shortest = width.min(height) as f32 * scale;
    if longest < MIN_DIMENSION as f32 && shortest > 0.0 {
        scale *= MIN_DIMENSION as f32 / shortest;
    }

    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

/// Bring the page to a resolution the recogniser handles well
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(OcrError::PreprocessingError(
            "resize: image has no pixels".to_string(),
        ));
    }

    let (new_width, new_height) = target_size(width, height);

    // Within 5% of the current size: not worth resampling
    let ratio = new_width as f32 / width as f32;
    if (0.95..=1.05).contains(&ratio) {
        return Ok(image);
    }

    Ok(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}
