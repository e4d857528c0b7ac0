use super::{DocumentRecord, HistoryEntry, HistoryStore, NewDocument};
use crate::config::StoreKind;
use crate::error::OcrError;
use crate::fields::StructuredFields;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const DATABASE_FILE: &str = "documents.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        file_name       TEXT NOT NULL,
        extracted_text  TEXT,
        structured_data TEXT,
        processed_at    TIMESTAMP NOT NULL,
        accuracy        REAL NOT NULL DEFAULT 0,
        doc_type        TEXT NOT NULL
    );";

const SUMMARY_COLUMNS: &str = "id, file_name, doc_type, processed_at, accuracy";

/// Full-text history in a single SQLite table
pub struct SqliteHistory {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    pub fn open(dir: &Path) -> Result<Self, OcrError> {
        fs::create_dir_all(dir)
            .map_err(|e| OcrError::Storage(format!("Failed to create {:?}: {}", dir, e)))?;

        let path = dir.join(DATABASE_FILE);
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("SQLite history opened at {:?}", path);
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, OcrError> {
        self.conn
            .lock()
            .map_err(|_| OcrError::Internal("History connection lock poisoned".to_string()))
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get::<_, i64>(0)? as u64,
        file_name: row.get(1)?,
        doc_type: row.get(2)?,
        processed_at: row.get(3)?,
        accuracy: row.get(4)?,
    })
}

impl HistoryStore for SqliteHistory {
    fn kind(&self) -> StoreKind {
        StoreKind::Sqlite
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn append(&self, doc: &NewDocument) -> Result<u64, OcrError> {
        let fields = doc
            .fields
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| OcrError::Storage(format!("Failed to serialize fields: {}", e)))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents
                (file_name, extracted_text, structured_data, processed_at, accuracy, doc_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.file_name,
                doc.text,
                fields,
                doc.processed_at,
                doc.accuracy,
                doc.doc_type.label(),
            ],
        )?;

        let id = conn.last_insert_rowid() as u64;
        tracing::debug!("Recorded {} as document {}", doc.file_name, id);
        Ok(id)
    }

    fn list(&self, doc_type: Option<&str>) -> Result<Vec<HistoryEntry>, OcrError> {
        let conn = self.conn()?;

        let entries = match doc_type {
            Some(doc_type) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM documents WHERE doc_type = ?1
                     ORDER BY processed_at DESC, id DESC",
                    SUMMARY_COLUMNS
                ))?;
                let rows = stmt.query_map(params![doc_type], entry_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM documents ORDER BY processed_at DESC, id DESC",
                    SUMMARY_COLUMNS
                ))?;
                let rows = stmt.query_map([], entry_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        Ok(entries)
    }

    fn get(&self, id: u64) -> Result<Option<DocumentRecord>, OcrError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {}, extracted_text, structured_data FROM documents WHERE id = ?1",
                    SUMMARY_COLUMNS
                ),
                params![id as i64],
                |row| {
                    Ok((
                        entry_from_row(row)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((entry, text, fields_json)) = row else {
            return Ok(None);
        };

        let fields = match fields_json {
            Some(json) => match serde_json::from_str::<StructuredFields>(&json) {
                Ok(fields) => Some(fields),
                Err(e) => {
                    tracing::warn!("Document {} has unreadable fields: {}", id, e);
                    None
                }
            },
            None => None,
        };

        Ok(Some(DocumentRecord {
            entry,
            text: text.unwrap_or_default(),
            fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::DocumentType;
    use crate::history::new_document;
    use chrono::Duration;

    #[test]
    fn test_append_and_get_full_record() {
        let dir = tempfile::tempdir().unwrap();
        let history = SqliteHistory::open(dir.path()).unwrap();

        let mut doc = new_document("rg.png", DocumentType::Identity, 91.0);
        doc.text = "CPF: 987.654.321-00 RG: 12.345.678-9".to_string();
        doc.fields = Some(StructuredFields::from_text(&doc.text));

        let id = history.append(&doc).unwrap();
        let record = history.get(id).unwrap().expect("record exists");

        assert_eq!(record.entry.file_name, "rg.png");
        assert_eq!(record.entry.doc_type, "Identity Document");
        assert_eq!(record.entry.processed_at, doc.processed_at);
        assert_eq!(record.entry.accuracy, 91.0);
        assert_eq!(record.text, doc.text);
        assert_eq!(
            record.fields.and_then(|f| f.cpf).as_deref(),
            Some("987.654.321-00")
        );
    }

    #[test]
    fn test_get_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let history = SqliteHistory::open(dir.path()).unwrap();
        assert!(history.get(42).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        let history = SqliteHistory::open(dir.path()).unwrap();

        let older = new_document("contract.png", DocumentType::Contract, 0.0);
        let mut newer = new_document("invoice.png", DocumentType::Invoice, 0.0);
        newer.processed_at = older.processed_at + Duration::hours(2);
        history.append(&older).unwrap();
        history.append(&newer).unwrap();

        let all = history.list(None).unwrap();
        let names: Vec<&str> = all.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["invoice.png", "contract.png"]);

        let contracts = history.list(Some("Contract")).unwrap();
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].file_name, "contract.png");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        SqliteHistory::open(dir.path())
            .unwrap()
            .append(&new_document("a.png", DocumentType::General, 0.0))
            .unwrap();

        let reopened = SqliteHistory::open(dir.path()).unwrap();
        assert_eq!(reopened.list(None).unwrap().len(), 1);
    }
}
