use crate::error::OcrError;
use image::DynamicImage;
use imageproc::filter::median_filter;

/// Remove scanner speckle with a 3x3 median filter
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.into_luma8();
    Ok(DynamicImage::ImageLuma8(median_filter(&gray, 1, 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_isolated_specks_removed() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([230]));
        img.put_pixel(3, 3, Luma([0]));
        img.put_pixel(7, 6, Luma([0]));

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap();
        let gray = result.to_luma8();

        assert_eq!(gray.get_pixel(3, 3).0[0], 230);
        assert_eq!(gray.get_pixel(7, 6).0[0], 230);
    }

    #[test]
    fn test_solid_stroke_survives() {
        let img = GrayImage::from_fn(12, 12, |x, _| if (4..8).contains(&x) { Luma([10]) } else { Luma([240]) });

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap();

        assert_eq!(result.to_luma8().get_pixel(5, 6).0[0], 10);
    }
}
