//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use super::assets;
use super::quality::estimate_confidence;
use crate::config::Config;
use crate::engine::{OcrEngine, OcrResult};
use crate::error::OcrError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;

const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// OCR Engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        if !config.language.split('+').any(|lang| lang == "eng") {
            tracing::warn!(
                "ocrs only recognizes Latin script; language '{}' is approximated",
                config.language
            );
        }

        let models_dir = assets::cache_dir("models")?;
        let detection_path =
            assets::ensure_downloaded(&models_dir, "text-detection.rten", DETECTION_MODEL_URL)?;
        let recognition_path =
            assets::ensure_downloaded(&models_dir, "text-recognition.rten", RECOGNITION_MODEL_URL)?;

        let detection_model = Model::load_file(&detection_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized");

        Ok(Self { engine })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        // ImageSource expects packed RGB (HWC)
        let rgb = image.to_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions()).map_err(|e| {
            OcrError::ProcessingError(format!("Failed to create image source: {}", e))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to prepare input: {}", e)))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to detect words: {}", e)))?;
        let lines = self.engine.find_text_lines(&input, &words);

        let recognized = self
            .engine
            .recognize_text(&input, &lines)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let text = recognized
            .iter()
            .flatten()
            .map(|line| line.words().map(|w| w.to_string()).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!("ocrs recognized {} lines", lines.len());

        Ok(OcrResult {
            confidence: estimate_confidence(&text),
            text,
            warnings: Vec::new(),
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["eng".to_string()]
    }
}
