use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Convert to 8-bit grayscale with ITU-R 601-2 luma weights
/// (L = R * 299/1000 + G * 587/1000 + B * 114/1000).
/// Transparent regions are composited onto white so they read as paper.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    if let DynamicImage::ImageLuma8(_) = image {
        return Ok(image);
    }

    let rgba = image.into_rgba8();
    let gray = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Luma([luma(on_white(r, a), on_white(g, a), on_white(b, a))])
    });

    Ok(DynamicImage::ImageLuma8(gray))
}

fn on_white(channel: u8, alpha: u8) -> u32 {
    let a = alpha as u32;
    (channel as u32 * a + 255 * (255 - a)) / 255
}

/// 601-2 weights in 16-bit fixed point, rounded
fn luma(r: u32, g: u32, b: u32) -> u8 {
    ((r * 19595 + g * 38470 + b * 7471 + 0x8000) >> 16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_grayscale_converts_color() {
        let mut img = RgbImage::new(10, 10);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([0, 0, 255]));

        let result = apply(DynamicImage::ImageRgb8(img)).unwrap();
        let gray = result.to_luma8();

        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
        assert_eq!(gray.get_pixel(3, 0).0[0], 0);
    }

    #[test]
    fn test_white_stays_white() {
        let img = RgbImage::from_pixel(3, 3, Rgb([255, 255, 255]));
        let result = apply(DynamicImage::ImageRgb8(img)).unwrap();
        assert!(result.to_luma8().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_half_transparent_red_is_lightened() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 128]));
        let result = apply(DynamicImage::ImageRgba8(img)).unwrap();
        // Composited onto white: (255, 127, 127)
        assert_eq!(result.to_luma8().get_pixel(0, 0).0[0], 165);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 1, Rgba([0, 0, 0, 255]));

        let result = apply(DynamicImage::ImageRgba8(img)).unwrap();
        let gray = result.as_luma8().expect("luma output");

        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn test_grayscale_preserves_dimensions() {
        let img = RgbImage::new(100, 50);
        let result = apply(DynamicImage::ImageRgb8(img)).unwrap();
        assert_eq!(result.width(), 100);
        assert_eq!(result.height(), 50);
    }
}
