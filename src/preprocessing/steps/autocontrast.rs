use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Percentage of pixels ignored at each end of the histogram
pub const DEFAULT_CUTOFF: f32 = 2.0;

/// Stretch contrast so the remaining histogram spans 0-255.
/// Stray specks and scanner borders are ignored through the cutoff.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    Ok(DynamicImage::ImageLuma8(autocontrast(&gray, DEFAULT_CUTOFF)))
}

pub fn autocontrast(img: &GrayImage, cutoff: f32) -> GrayImage {
    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let clip = (total as f64 * cutoff.clamp(0.0, 50.0) as f64 / 100.0) as u64;

    trim_low(&mut histogram, clip);
    histogram.reverse();
    trim_low(&mut histogram, clip);
    histogram.reverse();

    let lo = histogram.iter().position(|&c| c > 0);
    let hi = histogram.iter().rposition(|&c| c > 0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo as f64, hi as f64),
        _ => return img.clone(),
    };

    // Mapped values are truncated, not rounded
    let scale = 255.0 / (hi - lo);
    let offset = -lo * scale;
    let lut: Vec<u8> = (0..256)
        .map(|v| (v as f64 * scale + offset).clamp(0.0, 255.0) as u8)
        .collect();

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([lut[img.get_pixel(x, y).0[0] as usize]])
    })
}

/// Remove `amount` pixels from the darkest bins upward
fn trim_low(histogram: &mut [u64; 256], mut amount: u64) {
    for bin in histogram.iter_mut() {
        if amount == 0 {
            break;
        }
        let taken = (*bin).min(amount);
        *bin -= taken;
        amount -= taken;
    }
}
