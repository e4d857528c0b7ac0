use crate::error::OcrError;
use image::DynamicImage;
use serde::Serialize;
use std::time::Instant;

use super::steps;

type StepFn = fn(DynamicImage) -> Result<DynamicImage, OcrError>;

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Hand the decoded image to the engine untouched
    None,
    /// Steps: grayscale
    Minimal,
    /// Document scan pipeline.
    /// Steps: grayscale, autocontrast, sharpen
    #[default]
    Standard,
    /// Poor quality photos and faxes.
    /// Steps: grayscale, resize, denoise, autocontrast, sharpen, threshold
    Aggressive,
}

impl Preset {
    /// Parse a preset name as given on the command line or in settings
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "minimal" => Some(Self::Minimal),
            "standard" | "default" => Some(Self::Standard),
            "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Aggressive => "aggressive",
        }
    }

    /// Ordered steps this preset runs
    fn steps(&self) -> &'static [(&'static str, StepFn)] {
        match self {
            Self::None => &[],
            Self::Minimal => MINIMAL_STEPS,
            Self::Standard => STANDARD_STEPS,
            Self::Aggressive => AGGRESSIVE_STEPS,
        }
    }
}

const MINIMAL_STEPS: &[(&str, StepFn)] = &[("grayscale", steps::grayscale::apply)];

const STANDARD_STEPS: &[(&str, StepFn)] = &[
    ("grayscale", steps::grayscale::apply),
    ("autocontrast", steps::autocontrast::apply),
    ("sharpen", steps::sharpen::apply),
];

const AGGRESSIVE_STEPS: &[(&str, StepFn)] = &[
    ("grayscale", steps::grayscale::apply),
    ("resize", steps::resize::apply),
    ("denoise", steps::denoise::apply),
    ("autocontrast", steps::autocontrast::apply),
    ("sharpen", steps::sharpen::apply),
    ("threshold", steps::threshold::apply),
];

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    #[serde(skip)]
    pub image: DynamicImage,
    pub total_time_ms: u64,
    pub preset: String,
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline that applies steps based on preset
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    preset: Preset,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    /// Run every step of the configured preset in order
    pub fn process(&self, image: DynamicImage) -> Result<PreprocessingResult, OcrError> {
        let start = Instant::now();
        let mut timings = Vec::new();
        let mut img = image;

        for (name, step) in self.preset.steps() {
            let step_start = Instant::now();
            img = step(img).map_err(|e| match e {
                OcrError::PreprocessingError(_) => e,
                other => OcrError::PreprocessingError(format!("{}: {}", name, other)),
            })?;
            timings.push(StepTiming {
                name: name.to_string(),
                time_ms: step_start.elapsed().as_millis() as u64,
            });
        }

        tracing::debug!(
            "Preprocessing ({}) finished {} steps in {}ms",
            self.preset.as_str(),
            timings.len(),
            start.elapsed().as_millis()
        );

        Ok(PreprocessingResult {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            preset: self.preset.as_str().to_string(),
            steps: timings,
        })
    }
}
