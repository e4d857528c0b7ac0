//! OCR engine implementations
//!
//! This module contains implementations of the OcrEngine trait for different
//! OCR backends. Engines are conditionally compiled based on feature flags.

pub mod assets;

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;
#[cfg(feature = "engine-ocrs")]
mod quality;

#[cfg(feature = "engine-tesseract")]
pub mod tesseract;

use crate::config::Config;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use serde::Serialize;
use std::sync::Arc;

/// Information about an available engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub supported_languages: Vec<String>,
}

impl EngineInfo {
    pub fn of(engine: &dyn OcrEngine) -> Self {
        Self {
            name: engine.name(),
            description: engine.description(),
            supported_languages: engine.supported_languages(),
        }
    }
}

/// Registry of available OCR engines
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngine>>,
    default_engine: String,
}

impl EngineRegistry {
    /// Initialize every compiled-in engine.
    /// The configured engine becomes the default, else the first one built.
    #[allow(unused_mut)]
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        #[cfg(feature = "engine-ocrs")]
        {
            tracing::info!("Initializing ocrs engine...");
            engines.push(Arc::new(ocrs::OcrsEngine::new(config)?));
        }

        #[cfg(feature = "engine-tesseract")]
        {
            tracing::info!("Initializing tesseract engine...");
            engines.push(Arc::new(tesseract::TesseractEngine::new(config)?));
        }

        Self::from_engines(engines, config.engine.as_deref())
    }

    /// Build a registry from already constructed engines
    pub fn from_engines(
        engines: Vec<Arc<dyn OcrEngine>>,
        preferred: Option<&str>,
    ) -> Result<Self, OcrError> {
        let first = engines.first().ok_or_else(|| {
            OcrError::InitializationError(
                "No OCR engines available. Build with --features engine-ocrs or --features engine-tesseract".to_string(),
            )
        })?;

        let default_engine = match preferred {
            Some(name) if engines.iter().any(|e| e.name() == name) => name.to_string(),
            Some(name) => {
                let available: Vec<&str> = engines.iter().map(|e| e.name()).collect();
                return Err(OcrError::InitializationError(format!(
                    "Unknown engine '{}'. Available engines: {}",
                    name,
                    available.join(", ")
                )));
            }
            None => first.name().to_string(),
        };

        Ok(Self {
            engines,
            default_engine,
        })
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrEngine>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Get the default engine
    pub fn default(&self) -> Option<Arc<dyn OcrEngine>> {
        self.get(&self.default_engine)
    }

    pub fn default_name(&self) -> &str {
        &self.default_engine
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines.iter().map(|e| EngineInfo::of(e.as_ref())).collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::engine::OcrResult;
    use image::DynamicImage;

    /// Engine returning canned text, for pipeline and server tests
    pub struct CannedEngine {
        pub name: &'static str,
        pub text: String,
        pub confidence: f32,
    }

    impl CannedEngine {
        pub fn new(text: &str) -> Self {
            Self {
                name: "canned",
                text: text.to_string(),
                confidence: 0.9,
            }
        }
    }

    impl OcrEngine for CannedEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "Returns fixed text"
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<OcrResult, OcrError> {
            Ok(OcrResult {
                text: self.text.clone(),
                confidence: self.confidence,
                warnings: Vec::new(),
            })
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["por".to_string()]
        }
    }
}
