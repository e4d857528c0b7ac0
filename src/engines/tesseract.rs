//! Tesseract engine implementation
//!
//! Statically linked Tesseract via tesseract-static. Configured for printed
//! Portuguese documents by default: automatic page segmentation and the
//! LSTM recognizer. Traineddata is taken from the configured tessdata
//! directory or downloaded once into the cache.

use super::assets;
use crate::config::Config;
use crate::engine::{OcrEngine, OcrResult};
use crate::error::OcrError;
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tesseract_static::tesseract::Tesseract;

/// Fully automatic page segmentation, no orientation detection
const PAGE_SEG_MODE: &str = "3";

pub struct TesseractEngine {
    tessdata_path: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let language = config.language.clone();
        let tessdata_path = match &config.tessdata_path {
            Some(path) if has_traineddata(Path::new(path), &language) => path.clone(),
            Some(path) => {
                tracing::warn!(
                    "No traineddata for '{}' under {}, falling back to the download cache",
                    language,
                    path
                );
                download_tessdata(&language)?
            }
            None => download_tessdata(&language)?,
        };

        // Fail at startup rather than on the first document
        Tesseract::new(Some(&tessdata_path), Some(&language)).map_err(|e| {
            OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;

        tracing::info!(
            "Tesseract engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            language
        );

        Ok(Self {
            tessdata_path,
            language,
        })
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        "Tesseract LSTM engine - multilingual, tuned for printed documents"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        // BMP is always readable by leptonica
        let mut bmp = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to encode BMP: {}", e)))?;

        tracing::debug!(
            "Tesseract input {}x{}, {} bytes",
            image.width(),
            image.height(),
            bmp.len()
        );

        let mut tess = Tesseract::new(Some(&self.tessdata_path), Some(&self.language))
            .map_err(|e| OcrError::ProcessingError(format!("Failed to create Tesseract: {}", e)))?
            .set_variable("tessedit_pageseg_mode", PAGE_SEG_MODE)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to set page mode: {}", e)))?
            .set_image_from_mem(&bmp)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to set image: {}", e)))?
            .recognize()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to get text: {}", e)))?;

        Ok(OcrResult {
            text: text.trim().to_string(),
            confidence: tess.mean_text_conf() as f32 / 100.0,
            warnings: Vec::new(),
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        self.language.split('+').map(str::to_string).collect()
    }
}

fn has_traineddata(dir: &Path, language: &str) -> bool {
    language
        .split('+')
        .all(|lang| dir.join(format!("{}.traineddata", lang)).is_file())
}

/// Fetch every language of a `por+eng` style language string into the cache
fn download_tessdata(language: &str) -> Result<String, OcrError> {
    let dir = assets::cache_dir("tessdata")?;

    for lang in language.split('+') {
        let filename = format!("{}.traineddata", lang);
        let url = format!(
            "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}",
            filename
        );
        assets::ensure_downloaded(&dir, &filename, &url)?;
    }

    dir.to_str()
        .map(str::to_string)
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}
