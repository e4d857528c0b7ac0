use crate::error::OcrError;
use image::DynamicImage;

/// Text recognized from one image
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    /// 0.0-1.0; engines without native scores estimate it from the text
    pub confidence: f32,
    pub warnings: Vec<String>,
}

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "tesseract")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize text in an already preprocessed image
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}
