use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("Could not decode image {path}: {reason}")]
    ImageLoad { path: String, reason: String },

    #[error("No text recognized in {0}")]
    NoText(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("History storage error: {0}")]
    Storage(String),

    #[error("No documents to export")]
    NothingToExport,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for OcrError {
    fn from(err: rusqlite::Error) -> Self {
        OcrError::Storage(err.to_string())
    }
}

impl From<csv::Error> for OcrError {
    fn from(err: csv::Error) -> Self {
        OcrError::Storage(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::InitializationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OcrError::ProcessingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::PreprocessingError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PREPROCESSING_ERROR")
            }
            OcrError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            OcrError::EmptyFile(_) => (StatusCode::BAD_REQUEST, "EMPTY_FILE"),
            OcrError::ImageLoad { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "UNSUPPORTED_FORMAT"),
            OcrError::NoText(_) => (StatusCode::UNPROCESSABLE_ENTITY, "NO_TEXT"),
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            OcrError::NothingToExport => (StatusCode::NOT_FOUND, "NOTHING_TO_EXPORT"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
