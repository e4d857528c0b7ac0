//! Individual preprocessing steps

pub mod autocontrast;
pub mod denoise;
pub mod grayscale;
pub mod resize;
pub mod sharpen;
pub mod threshold;
