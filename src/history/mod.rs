//! History of processed documents
//!
//! Two interchangeable backends record one row per successful recognition:
//! a CSV file that keeps only the summary columns and a SQLite table that
//! also keeps the text and extracted fields. Rows are appended, never updated.

pub mod csv_store;
pub mod sqlite_store;

pub use csv_store::CsvHistory;
pub use sqlite_store::SqliteHistory;

use crate::config::StoreKind;
use crate::error::OcrError;
use crate::fields::{DocumentType, StructuredFields};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Summary row shown when browsing history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub file_name: String,
    pub doc_type: String,
    pub processed_at: NaiveDateTime,
    /// Recognition confidence in percent; 0 when unknown
    pub accuracy: f64,
}

/// Full record, available from stores that keep the text
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub text: String,
    pub fields: Option<StructuredFields>,
}

/// A document about to be recorded
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_name: String,
    pub text: String,
    pub fields: Option<StructuredFields>,
    pub accuracy: f64,
    pub doc_type: DocumentType,
    pub processed_at: NaiveDateTime,
}

pub trait HistoryStore: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// File backing the store
    fn location(&self) -> &Path;

    /// Record a document and return its id
    fn append(&self, doc: &NewDocument) -> Result<u64, OcrError>;

    /// Entries, optionally restricted to one document type label
    fn list(&self, doc_type: Option<&str>) -> Result<Vec<HistoryEntry>, OcrError>;

    /// Full record by id; `None` when unknown or when the store keeps no text
    fn get(&self, id: u64) -> Result<Option<DocumentRecord>, OcrError>;
}

/// Open the configured backend inside the results directory
pub fn open_store(kind: StoreKind, results_dir: &Path) -> Result<Arc<dyn HistoryStore>, OcrError> {
    let store: Arc<dyn HistoryStore> = match kind {
        StoreKind::Csv => Arc::new(CsvHistory::open(results_dir)?),
        StoreKind::Sqlite => Arc::new(SqliteHistory::open(results_dir)?),
    };
    tracing::debug!("History store ({}) at {:?}", kind.as_str(), store.location());
    Ok(store)
}

#[cfg(test)]
pub(crate) fn new_document(file_name: &str, doc_type: DocumentType, accuracy: f64) -> NewDocument {
    use chrono::NaiveDate;

    NewDocument {
        file_name: file_name.to_string(),
        text: format!("text of {}", file_name),
        fields: None,
        accuracy,
        doc_type,
        processed_at: NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .expect("valid timestamp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_by_kind() {
        let dir = tempfile::tempdir().unwrap();

        let csv = open_store(StoreKind::Csv, dir.path()).unwrap();
        assert_eq!(csv.kind(), StoreKind::Csv);
        assert!(csv.location().ends_with("document_history.csv"));

        let sqlite = open_store(StoreKind::Sqlite, dir.path()).unwrap();
        assert_eq!(sqlite.kind(), StoreKind::Sqlite);
        assert!(sqlite.location().ends_with("documents.db"));
    }

    #[test]
    fn test_backends_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let csv = open_store(StoreKind::Csv, dir.path()).unwrap();
        let sqlite = open_store(StoreKind::Sqlite, dir.path()).unwrap();

        csv.append(&new_document("a.png", DocumentType::General, 0.0))
            .unwrap();

        assert_eq!(csv.list(None).unwrap().len(), 1);
        assert!(sqlite.list(None).unwrap().is_empty());
    }
}
