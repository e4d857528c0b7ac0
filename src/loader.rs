use crate::error::OcrError;
use image::{DynamicImage, ImageReader};
use std::fs;
use std::path::Path;

/// Extensions offered for processing, compared lower-cased
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image file names in `dir`, sorted
pub fn list_images(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot list images in {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut images: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
        .collect();

    images.sort();
    images
}

/// Decode an image from disk.
///
/// The format is first taken from the extension. Files whose extension lies
/// about their content (a PNG saved as `.jpg`, a scanner writing `.tmp`)
/// are retried with the format sniffed from the leading bytes.
pub fn load_image(path: &Path) -> Result<DynamicImage, OcrError> {
    let shown = path.display().to_string();

    let metadata = fs::metadata(path).map_err(|_| OcrError::NotFound(shown.clone()))?;
    if metadata.len() == 0 {
        return Err(OcrError::EmptyFile(shown));
    }

    match image::open(path) {
        Ok(img) => Ok(img),
        Err(first) => {
            tracing::warn!(
                "Could not decode {} by extension ({}), sniffing content",
                shown,
                first
            );
            ImageReader::open(path)
                .and_then(|reader| reader.with_guessed_format())
                .map_err(|e| e.to_string())
                .and_then(|reader| reader.decode().map_err(|e| e.to_string()))
                .map_err(|second| OcrError::ImageLoad {
                    path: shown,
                    reason: format!("{}; {}", first, second),
                })
        }
    }
}
