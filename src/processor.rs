use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::fields::{DocumentType, StructuredFields};
use crate::history::{HistoryStore, NewDocument};
use crate::loader::{list_images, load_image};
use crate::preprocessing::{Pipeline, PreprocessingResult};
use crate::results::ResultsDir;
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of running one image through the whole pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub file_name: String,
    pub text: String,
    pub fields: StructuredFields,
    pub doc_type: DocumentType,
    pub confidence: f32,
    pub history_id: u64,
    pub result_path: PathBuf,
    pub preprocessing: PreprocessingResult,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub outcomes: Vec<(String, Result<ProcessedDocument, OcrError>)>,
}

/// Load, preprocess, recognize, save and record documents
pub struct DocumentProcessor {
    engine: Arc<dyn OcrEngine>,
    pipeline: Pipeline,
    images_dir: PathBuf,
    results: ResultsDir,
    history: Arc<dyn HistoryStore>,
}

impl DocumentProcessor {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        pipeline: Pipeline,
        images_dir: impl Into<PathBuf>,
        results: ResultsDir,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            engine,
            pipeline,
            images_dir: images_dir.into(),
            results,
            history,
        }
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Process an image given by name inside the images directory, or by absolute path
    pub fn process_file(
        &self,
        name: &str,
        doc_type: Option<DocumentType>,
    ) -> Result<ProcessedDocument, OcrError> {
        let path = self.resolve(name);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(name)
            .to_string();

        tracing::info!("Processing {}", file_name);
        let image = load_image(&path)?;
        self.process_image(&file_name, image, doc_type)
    }

    /// Process an already decoded image, e.g. an upload
    pub fn process_image(
        &self,
        file_name: &str,
        image: DynamicImage,
        doc_type: Option<DocumentType>,
    ) -> Result<ProcessedDocument, OcrError> {
        let start = Instant::now();

        let preprocessed = self.pipeline.process(image)?;
        let result = self.engine.recognize(&preprocessed.image)?;

        let text = result.text.trim().to_string();
        if text.is_empty() {
            return Err(OcrError::NoText(file_name.to_string()));
        }

        let result_path = self.results.save(file_name, &text)?;
        let fields = StructuredFields::from_text(&text);
        let doc_type = doc_type.unwrap_or_else(|| DocumentType::detect(&text));

        let recorded = self.history.append(&NewDocument {
            file_name: file_name.to_string(),
            text: text.clone(),
            fields: Some(fields.clone()),
            accuracy: to_percent(result.confidence),
            doc_type: doc_type.clone(),
            processed_at: chrono::Local::now().naive_local(),
        });

        // A result file without a history row is never left behind
        let history_id = match recorded {
            Ok(id) => id,
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&result_path) {
                    tracing::warn!("Could not remove {:?}: {}", result_path, remove_err);
                }
                return Err(e);
            }
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "{} done in {}ms: {} chars, type '{}', confidence {:.2}",
            file_name,
            processing_time_ms,
            text.len(),
            doc_type,
            result.confidence
        );

        Ok(ProcessedDocument {
            file_name: file_name.to_string(),
            text,
            fields,
            doc_type,
            confidence: result.confidence,
            history_id,
            result_path,
            preprocessing: preprocessed,
            processing_time_ms,
            warnings: result.warnings,
        })
    }

    /// Process each name in sorted order, carrying on past failures
    pub fn process_batch(&self, names: &[String], doc_type: Option<DocumentType>) -> BatchSummary {
        let mut names = names.to_vec();
        names.sort();
        names.dedup();

        let mut summary = BatchSummary {
            processed: 0,
            failed: 0,
            outcomes: Vec::with_capacity(names.len()),
        };

        for name in names {
            let outcome = self.process_file(&name, doc_type.clone());
            match &outcome {
                Ok(_) => summary.processed += 1,
                Err(e) => {
                    tracing::warn!("Failed to process {}: {}", name, e);
                    summary.failed += 1;
                }
            }
            summary.outcomes.push((name, outcome));
        }

        tracing::info!(
            "Batch finished: {} processed, {} failed",
            summary.processed,
            summary.failed
        );
        summary
    }

    /// Every image currently in the images directory
    pub fn process_all(&self, doc_type: Option<DocumentType>) -> BatchSummary {
        self.process_batch(&list_images(&self.images_dir), doc_type)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.images_dir.join(path)
        }
    }
}

/// Engine confidence (0-1) as a percentage with two decimals
fn to_percent(confidence: f32) -> f64 {
    (confidence.clamp(0.0, 1.0) as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreKind;
    use crate::engines::testing::CannedEngine;
    use crate::history::{open_store, DocumentRecord, HistoryEntry};
    use crate::preprocessing::Preset;
    use image::{GrayImage, Luma};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        images: PathBuf,
        results: PathBuf,
    }

    impl Fixture {
        fn new(images: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let images_dir = dir.path().join("images");
            let results_dir = dir.path().join("results");
            fs::create_dir_all(&images_dir).unwrap();
            for name in images {
                GrayImage::from_fn(32, 16, |x, _| Luma([if x % 5 == 0 { 20 } else { 230 }]))
                    .save(images_dir.join(name))
                    .unwrap();
            }
            Self {
                _dir: dir,
                images: images_dir,
                results: results_dir,
            }
        }

        fn processor(&self, engine: CannedEngine, store: StoreKind) -> DocumentProcessor {
            DocumentProcessor::new(
                Arc::new(engine),
                Pipeline::new(Preset::Standard),
                &self.images,
                ResultsDir::new(&self.results),
                open_store(store, &self.results).unwrap(),
            )
        }
    }

    /// Store whose writes always fail
    struct FailingHistory {
        path: PathBuf,
    }

    impl HistoryStore for FailingHistory {
        fn kind(&self) -> StoreKind {
            StoreKind::Csv
        }

        fn location(&self) -> &Path {
            &self.path
        }

        fn append(&self, _doc: &NewDocument) -> Result<u64, OcrError> {
            Err(OcrError::Storage("disk full".to_string()))
        }

        fn list(&self, _doc_type: Option<&str>) -> Result<Vec<HistoryEntry>, OcrError> {
            Ok(Vec::new())
        }

        fn get(&self, _id: u64) -> Result<Option<DocumentRecord>, OcrError> {
            Ok(None)
        }
    }

    const ID_TEXT: &str = "  Nome: Maria Oliveira Santos\nCPF: 987.654.321-00\nRG: 12.345.678-9\n";

    #[test]
    fn test_process_file_saves_text_and_records_history() {
        let fixture = Fixture::new(&["id_card.png"]);
        let processor = fixture.processor(CannedEngine::new(ID_TEXT), StoreKind::Csv);

        let doc = processor.process_file("id_card.png", None).unwrap();

        assert_eq!(doc.text, ID_TEXT.trim());
        assert_eq!(doc.doc_type, DocumentType::Identity);
        assert_eq!(doc.fields.cpf.as_deref(), Some("987.654.321-00"));
        assert_eq!(doc.history_id, 1);
        assert_eq!(doc.preprocessing.preset, "standard");
        assert_eq!(
            fs::read_to_string(fixture.results.join("id_card_text.txt")).unwrap(),
            ID_TEXT.trim()
        );

        let history = processor.history().list(None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].file_name, "id_card.png");
        assert_eq!(history[0].doc_type, "Identity Document");
        assert_eq!(history[0].accuracy, 90.0);
    }

    #[test]
    fn test_explicit_type_overrides_detection() {
        let fixture = Fixture::new(&["scan.png"]);
        let processor = fixture.processor(CannedEngine::new(ID_TEXT), StoreKind::Sqlite);

        let doc = processor
            .process_file("scan.png", Some(DocumentType::Custom("Receipt".to_string())))
            .unwrap();

        let record = processor.history().get(doc.history_id).unwrap().unwrap();
        assert_eq!(record.entry.doc_type, "Receipt");
        assert_eq!(record.text, ID_TEXT.trim());
        assert_eq!(
            record.fields.unwrap().rg.as_deref(),
            Some("12.345.678-9")
        );
    }

    #[test]
    fn test_blank_recognition_is_not_recorded() {
        let fixture = Fixture::new(&["blank.png"]);
        let processor = fixture.processor(CannedEngine::new(" \n "), StoreKind::Csv);

        let err = processor.process_file("blank.png", None).unwrap_err();

        assert!(matches!(err, OcrError::NoText(_)));
        assert!(processor.history().list(None).unwrap().is_empty());
        assert!(!fixture.results.join("blank_text.txt").exists());
    }

    #[test]
    fn test_batch_continues_after_failures() {
        let fixture = Fixture::new(&["b.png", "a.png"]);
        let processor = fixture.processor(CannedEngine::new("Contrato de aluguel"), StoreKind::Csv);

        let names = vec!["b.png".to_string(), "missing.png".to_string(), "a.png".to_string()];
        let summary = processor.process_batch(&names, None);

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        let order: Vec<&str> = summary.outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["a.png", "b.png", "missing.png"]);
        assert!(matches!(summary.outcomes[2].1, Err(OcrError::NotFound(_))));
    }

    #[test]
    fn test_process_all_uses_images_dir() {
        let fixture = Fixture::new(&["one.png", "two.png"]);
        fs::write(fixture.images.join("notes.txt"), "not an image").unwrap();
        let processor = fixture.processor(CannedEngine::new("Nota Fiscal 001"), StoreKind::Csv);

        let summary = processor.process_all(None);

        assert_eq!((summary.processed, summary.failed), (2, 0));
        let types: Vec<String> = processor
            .history()
            .list(Some("Invoice"))
            .unwrap()
            .into_iter()
            .map(|e| e.file_name)
            .collect();
        assert_eq!(types, vec!["one.png", "two.png"]);
    }

    #[test]
    fn test_failed_history_write_removes_result_file() {
        let fixture = Fixture::new(&["id_card.png"]);
        let processor = DocumentProcessor::new(
            Arc::new(CannedEngine::new(ID_TEXT)),
            Pipeline::new(Preset::Standard),
            &fixture.images,
            ResultsDir::new(&fixture.results),
            Arc::new(FailingHistory {
                path: fixture.results.join("document_history.csv"),
            }),
        );

        let result = processor.process_file("id_card.png", None);

        assert!(matches!(result, Err(OcrError::Storage(_))));
        assert!(!fixture.results.join("id_card_text.txt").exists());
    }

    #[test]
    fn test_confidence_as_percent() {
        assert_eq!(to_percent(0.0), 0.0);
        assert_eq!(to_percent(0.8765), 87.65);
        assert_eq!(to_percent(1.7), 100.0);
    }
}
