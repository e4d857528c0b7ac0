use super::{DocumentRecord, HistoryEntry, HistoryStore, NewDocument};
use crate::config::StoreKind;
use crate::error::OcrError;
use chrono::NaiveDateTime;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const HISTORY_FILE: &str = "document_history.csv";
pub const HEADER: [&str; 5] = ["ID", "File", "Type", "Processed At", "Accuracy"];
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Summary-only history kept as a CSV file
pub struct CsvHistory {
    path: PathBuf,
    // Serializes appends so ids stay sequential
    write_lock: Mutex<()>,
}

impl CsvHistory {
    /// Open the history file in `dir`, writing the header if it is new
    pub fn open(dir: &Path) -> Result<Self, OcrError> {
        let path = dir.join(HISTORY_FILE);

        if !path.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| OcrError::Storage(format!("Failed to create {:?}: {}", dir, e)))?;
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(HEADER)?;
            writer
                .flush()
                .map_err(|e| OcrError::Storage(format!("Failed to write header: {}", e)))?;
            tracing::info!("Created history file {:?}", path);
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    fn reader(&self) -> Result<csv::Reader<fs::File>, OcrError> {
        Ok(csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?)
    }

    fn row_count(&self) -> Result<u64, OcrError> {
        Ok(self.reader()?.records().count() as u64)
    }
}

/// Rows written by hand or by older versions may be short or malformed
fn parse_row(record: &csv::StringRecord) -> Option<HistoryEntry> {
    Some(HistoryEntry {
        id: record.get(0)?.trim().parse().ok()?,
        file_name: record.get(1)?.to_string(),
        doc_type: record.get(2)?.to_string(),
        processed_at: NaiveDateTime::parse_from_str(record.get(3)?.trim(), TIMESTAMP_FORMAT)
            .ok()?,
        accuracy: record
            .get(4)
            .and_then(|a| a.trim().parse().ok())
            .unwrap_or(0.0),
    })
}

pub fn entry_record(entry: &HistoryEntry) -> [String; 5] {
    [
        entry.id.to_string(),
        entry.file_name.clone(),
        entry.doc_type.clone(),
        entry.processed_at.format(TIMESTAMP_FORMAT).to_string(),
        entry.accuracy.to_string(),
    ]
}

impl HistoryStore for CsvHistory {
    fn kind(&self) -> StoreKind {
        StoreKind::Csv
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn append(&self, doc: &NewDocument) -> Result<u64, OcrError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| OcrError::Internal("History lock poisoned".to_string()))?;

        let entry = HistoryEntry {
            id: self.row_count()? + 1,
            file_name: doc.file_name.clone(),
            doc_type: doc.doc_type.label().to_string(),
            processed_at: doc.processed_at,
            accuracy: doc.accuracy,
        };

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| OcrError::Storage(format!("Failed to open {:?}: {}", self.path, e)))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(entry_record(&entry))?;
        writer
            .flush()
            .map_err(|e| OcrError::Storage(format!("Failed to append history: {}", e)))?;

        tracing::debug!("Recorded {} as history entry {}", entry.file_name, entry.id);
        Ok(entry.id)
    }

    fn list(&self, doc_type: Option<&str>) -> Result<Vec<HistoryEntry>, OcrError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for (line, record) in self.reader()?.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping unreadable history row {}: {}", line + 2, e);
                    continue;
                }
            };
            match parse_row(&record) {
                Some(entry) if doc_type.map_or(true, |t| entry.doc_type == t) => {
                    entries.push(entry)
                }
                Some(_) => {}
                None => tracing::warn!("Skipping malformed history row {}", line + 2),
            }
        }

        Ok(entries)
    }

    fn get(&self, _id: u64) -> Result<Option<DocumentRecord>, OcrError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::DocumentType;
    use crate::history::new_document;
    use std::io::Write;

    #[test]
    fn test_new_file_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let history = CsvHistory::open(&dir.path().join("results")).unwrap();

        let raw = fs::read_to_string(history.location()).unwrap();
        assert_eq!(raw, "ID,File,Type,Processed At,Accuracy\n");
        assert!(history.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_append_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let history = CsvHistory::open(dir.path()).unwrap();

        let first = history
            .append(&new_document("rg.png", DocumentType::Identity, 0.0))
            .unwrap();
        let second = history
            .append(&new_document("nf.png", DocumentType::Invoice, 87.5))
            .unwrap();

        assert_eq!((first, second), (1, 2));

        let raw = fs::read_to_string(history.location()).unwrap();
        assert!(raw.contains("1,rg.png,Identity Document,15/03/2024 14:30:00,0\n"));
        assert!(raw.contains("2,nf.png,Invoice,15/03/2024 14:30:00,87.5\n"));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        CsvHistory::open(dir.path())
            .unwrap()
            .append(&new_document("a.png", DocumentType::General, 0.0))
            .unwrap();

        let reopened = CsvHistory::open(dir.path()).unwrap();
        let id = reopened
            .append(&new_document("b.png", DocumentType::General, 0.0))
            .unwrap();

        assert_eq!(id, 2);
        assert_eq!(reopened.list(None).unwrap().len(), 2);
    }

    #[test]
    fn test_filter_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let history = CsvHistory::open(dir.path()).unwrap();
        history
            .append(&new_document("a.png", DocumentType::Contract, 0.0))
            .unwrap();
        history
            .append(&new_document("b.png", DocumentType::Invoice, 0.0))
            .unwrap();
        history
            .append(&new_document("c.png", DocumentType::Contract, 0.0))
            .unwrap();

        let contracts = history.list(Some("Contract")).unwrap();
        let names: Vec<&str> = contracts.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert!(history.list(Some("contract")).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let history = CsvHistory::open(dir.path()).unwrap();
        let mut file = OpenOptions::new().append(true).open(history.location()).unwrap();
        writeln!(file, "x,broken").unwrap();
        writeln!(file, "7,old.png,General Document,01/01/2023 08:00:00").unwrap();

        let entries = history.list(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 7);
        assert_eq!(entries[0].accuracy, 0.0);
    }

    #[test]
    fn test_get_has_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let history = CsvHistory::open(dir.path()).unwrap();
        history
            .append(&new_document("a.png", DocumentType::General, 0.0))
            .unwrap();
        assert!(history.get(1).unwrap().is_none());
    }
}
