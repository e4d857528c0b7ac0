use crate::config::Config;
use crate::engines::EngineInfo;
use crate::error::OcrError;
use crate::fields::{DocumentType, StructuredFields};
use crate::history::{DocumentRecord, HistoryEntry};
use crate::loader::{load_image, IMAGE_EXTENSIONS};
use crate::preprocessing::PreprocessingResult;
use crate::processor::DocumentProcessor;
use crate::report::Report;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DocumentProcessor>,
    pub engines: Arc<Vec<EngineInfo>>,
    pub config: Arc<Config>,
}

/// OCR response
#[derive(Serialize)]
pub struct OcrResponse {
    pub id: u64,
    pub file_name: String,
    pub text: String,
    pub doc_type: DocumentType,
    pub fields: StructuredFields,
    pub confidence: f32,
    pub processing_time_ms: u64,
    pub preprocessing: PreprocessingResult,
    pub warnings: Vec<String>,
    pub engine: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub default_engine: String,
    pub available_engines: Vec<EngineInfo>,
    pub supported_formats: Vec<String>,
    pub default_preset: String,
    pub history_store: String,
    pub max_file_size_bytes: usize,
    pub default_language: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub doc_type: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/ocr", post(handle_ocr))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/history", get(handle_history))
        .route("/history/:id", get(handle_document))
        .route("/report", get(handle_report))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: Config,
    processor: DocumentProcessor,
    engines: Vec<EngineInfo>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(AppState {
        processor: Arc::new(processor),
        engines: Arc::new(engines),
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Run file and database work off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, OcrError>
where
    F: FnOnce() -> Result<T, OcrError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OcrError::Internal(format!("Worker task failed: {}", e)))?
}

/// Handle OCR requests
async fn handle_ocr(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, OcrError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut doc_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_data = Some(field.bytes().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?);
            }
            "doc_type" => {
                doc_type = Some(field.text().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Invalid doc_type: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let data = file_data.ok_or(OcrError::MissingFile)?;

    if data.len() > state.config.max_file_size {
        return Err(OcrError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    // Only the base name of the upload is kept; it names the result file
    let file_name = file_name
        .as_deref()
        .and_then(|n| std::path::Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload.png")
        .to_string();
    let extension = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| ".tmp".to_string());

    let doc_type = doc_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(DocumentType::from);

    let mut temp_file = tempfile::Builder::new()
        .suffix(&extension)
        .tempfile()
        .map_err(|e| OcrError::Internal(format!("Failed to create temp file: {}", e)))?;

    temp_file
        .write_all(&data)
        .map_err(|e| OcrError::Internal(format!("Failed to write temp file: {}", e)))?;

    let processor = state.processor.clone();
    let name = file_name.clone();
    let doc = blocking(move || {
        let image = load_image(temp_file.path())?;
        processor.process_image(&name, image, doc_type)
    })
    .await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "OCR of upload {} completed in {}ms, confidence: {:.2}, text length: {}",
        file_name,
        processing_time_ms,
        doc.confidence,
        doc.text.len()
    );

    Ok(Json(OcrResponse {
        id: doc.history_id,
        file_name: doc.file_name,
        text: doc.text,
        doc_type: doc.doc_type,
        fields: doc.fields,
        confidence: doc.confidence,
        processing_time_ms,
        preprocessing: doc.preprocessing,
        warnings: doc.warnings,
        engine: state.processor.engine().name().to_string(),
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_engine: state.processor.engine().name().to_string(),
        available_engines: state.engines.as_ref().clone(),
        supported_formats: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        default_preset: state.config.preset.as_str().to_string(),
        history_store: state.config.store.as_str().to_string(),
        max_file_size_bytes: state.config.max_file_size,
        default_language: state.config.language.clone(),
    })
}

async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, OcrError> {
    let history = state.processor.history().clone();
    let entries = blocking(move || history.list(query.doc_type.as_deref())).await?;
    Ok(Json(entries))
}

async fn handle_document(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DocumentRecord>, OcrError> {
    let history = state.processor.history().clone();
    let record = blocking(move || history.get(id)).await?;
    record
        .map(Json)
        .ok_or_else(|| OcrError::NotFound(format!("document {}", id)))
}

async fn handle_report(State(state): State<AppState>) -> Result<Json<Report>, OcrError> {
    let history = state.processor.history().clone();
    let entries = blocking(move || history.list(None)).await?;
    Ok(Json(Report::build(&entries)))
}
