//! Statistics over the processing history and CSV export

use crate::error::OcrError;
use crate::history::csv_store::{entry_record, HEADER, TIMESTAMP_FORMAT};
use crate::history::HistoryEntry;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const EXPORT_FILE: &str = "document_export.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    pub doc_type: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub total: usize,
    /// In order of first appearance
    pub by_type: Vec<TypeCount>,
    /// Mean of the known (non-zero) accuracies
    pub average_accuracy: Option<f64>,
    pub last_processed: Option<NaiveDateTime>,
}

impl Report {
    pub fn build(entries: &[HistoryEntry]) -> Self {
        let mut by_type: Vec<TypeCount> = Vec::new();
        for entry in entries {
            match by_type.iter_mut().find(|t| t.doc_type == entry.doc_type) {
                Some(existing) => existing.count += 1,
                None => by_type.push(TypeCount {
                    doc_type: entry.doc_type.clone(),
                    count: 1,
                }),
            }
        }

        let known: Vec<f64> = entries
            .iter()
            .map(|e| e.accuracy)
            .filter(|a| *a > 0.0)
            .collect();
        let average_accuracy =
            (!known.is_empty()).then(|| known.iter().sum::<f64>() / known.len() as f64);

        Self {
            total: entries.len(),
            by_type,
            average_accuracy,
            last_processed: entries.iter().map(|e| e.processed_at).max(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "OCR DOCUMENT REPORT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Total documents processed: {}", self.total)?;

        if self.total == 0 {
            return write!(f, "No documents processed yet.");
        }

        writeln!(f)?;
        writeln!(f, "Documents by type:")?;
        for t in &self.by_type {
            writeln!(f, "   {}: {}", t.doc_type, t.count)?;
        }

        if let Some(avg) = self.average_accuracy {
            writeln!(f)?;
            writeln!(f, "Average accuracy: {:.2}%", avg)?;
        }

        writeln!(f)?;
        match self.last_processed {
            Some(at) => write!(f, "Last processed: {}", at.format(TIMESTAMP_FORMAT)),
            None => write!(f, "Last processed: N/A"),
        }
    }
}

/// Write every entry to `dest_dir/document_export.csv`
pub fn export_csv(entries: &[HistoryEntry], dest_dir: &Path) -> Result<PathBuf, OcrError> {
    if entries.is_empty() {
        return Err(OcrError::NothingToExport);
    }

    fs::create_dir_all(dest_dir)
        .map_err(|e| OcrError::Storage(format!("Failed to create {:?}: {}", dest_dir, e)))?;

    let path = dest_dir.join(EXPORT_FILE);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(HEADER)?;
    for entry in entries {
        writer.write_record(entry_record(entry))?;
    }
    writer
        .flush()
        .map_err(|e| OcrError::Storage(format!("Failed to write export: {}", e)))?;

    tracing::info!("Exported {} documents to {:?}", entries.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn entry(id: u64, doc_type: &str, accuracy: f64, minutes: i64) -> HistoryEntry {
        let base = NaiveDate::from_ymd_opt(2024, 5, 2)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        HistoryEntry {
            id,
            file_name: format!("doc{}.png", id),
            doc_type: doc_type.to_string(),
            processed_at: base + Duration::minutes(minutes),
            accuracy,
        }
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.average_accuracy, None);

        let text = report.to_string();
        assert!(text.contains("Total documents processed: 0"));
        assert!(text.ends_with("No documents processed yet."));
    }

    #[test]
    fn test_counts_types_in_first_seen_order() {
        let entries = vec![
            entry(1, "Invoice", 0.0, 0),
            entry(2, "Identity Document", 0.0, 1),
            entry(3, "Invoice", 0.0, 2),
        ];
        let report = Report::build(&entries);

        assert_eq!(report.total, 3);
        assert_eq!(
            report.by_type,
            vec![
                TypeCount { doc_type: "Invoice".to_string(), count: 2 },
                TypeCount { doc_type: "Identity Document".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_average_ignores_unknown_accuracy() {
        let entries = vec![
            entry(1, "General Document", 80.0, 0),
            entry(2, "General Document", 0.0, 1),
            entry(3, "General Document", 90.0, 2),
        ];
        let report = Report::build(&entries);

        assert_eq!(report.average_accuracy, Some(85.0));
        assert!(report.to_string().contains("Average accuracy: 85.00%"));
    }

    #[test]
    fn test_no_accuracy_line_when_all_unknown() {
        let report = Report::build(&[entry(1, "Contract", 0.0, 0)]);
        assert!(!report.to_string().contains("Average accuracy"));
    }

    #[test]
    fn test_last_processed_is_latest_regardless_of_order() {
        // SQLite lists newest first, CSV oldest first
        let entries = vec![entry(2, "Contract", 0.0, 30), entry(1, "Contract", 0.0, 5)];
        let report = Report::build(&entries);

        assert_eq!(report.last_processed, Some(entries[0].processed_at));
        assert!(report.to_string().ends_with("Last processed: 02/05/2024 09:30:00"));
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![entry(1, "Invoice", 72.5, 0), entry(2, "Contract", 0.0, 1)];

        let path = export_csv(&entries, &dir.path().join("exports")).unwrap();

        assert!(path.ends_with(EXPORT_FILE));
        let raw = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines[0], "ID,File,Type,Processed At,Accuracy");
        assert_eq!(lines[1], "1,doc1.png,Invoice,02/05/2024 09:00:00,72.5");
        assert_eq!(lines[2], "2,doc2.png,Contract,02/05/2024 09:01:00,0");
    }

    #[test]
    fn test_export_refuses_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            export_csv(&[], dir.path()),
            Err(OcrError::NothingToExport)
        ));
        assert!(!dir.path().join(EXPORT_FILE).exists());
    }
}
