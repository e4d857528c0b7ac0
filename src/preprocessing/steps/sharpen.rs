use crate::error::OcrError;
use image::DynamicImage;
use imageproc::filter::filter3x3;

/// Classic 3x3 SHARPEN kernel: strong center, uniform negative ring, sum 16
const SHARPEN_KERNEL: [f32; 9] = [
    -2.0 / 16.0,
    -2.0 / 16.0,
    -2.0 / 16.0,
    -2.0 / 16.0,
    32.0 / 16.0,
    -2.0 / 16.0,
    -2.0 / 16.0,
    -2.0 / 16.0,
    -2.0 / 16.0,
];

/// Sharpen glyph edges so thin strokes survive recognition.
/// The outermost rows and columns are copied through unfiltered.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    let mut sharpened = filter3x3(&gray, &SHARPEN_KERNEL);

    let (width, height) = gray.dimensions();
    for (x, y, pixel) in gray.enumerate_pixels() {
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            sharpened.put_pixel(x, y, *pixel);
        }
    }

    Ok(DynamicImage::ImageLuma8(sharpened))
}
