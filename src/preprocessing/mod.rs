//! Image preprocessing applied before text recognition
//!
//! Scanned documents are converted to grayscale, contrast-stretched and
//! sharpened. Heavier presets add resizing, denoising and binarisation.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, PreprocessingResult, Preset};
