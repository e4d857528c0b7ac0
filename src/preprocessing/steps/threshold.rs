use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;

/// Binarise with a global Otsu threshold: ink becomes 0, paper 255
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    let level = otsu_level(&gray);
    tracing::trace!("Otsu threshold level {}", level);

    let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    Ok(DynamicImage::ImageLuma8(binary))
}
