//! Source loaders: turn uploaded files and dataset exports into documents.
//!
//! Loaders run before anything touches the index, so every error they
//! return leaves the index and manifest untouched.

use std::collections::BTreeSet;
use std::path::Path;

use ragdb_core::{Error, Result};
use ragdb_store::Document;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::file;

/// Column read by `load_dataset` when the caller names none.
pub const DEFAULT_COLUMN: &str = "text";

/// Documents read from one source plus the size recorded in the manifest.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub documents: Vec<Document>,
    pub size_bytes: u64,
}

/// Load an uploaded file as a single document titled by its file name.
pub fn load_text_file(path: &Path) -> Result<LoadedSource> {
    let content = file::extract_text(path)?;
    let size_bytes = std::fs::metadata(path)?.len();
    let title = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    debug!("Loaded {} ({} bytes)", path.display(), size_bytes);
    Ok(LoadedSource {
        documents: vec![Document::new(content).with_title(title)],
        size_bytes,
    })
}

/// Wrap text received in a request body as a single document.
pub fn text_document(title: &str, content: String) -> LoadedSource {
    let size_bytes = content.len() as u64;
    LoadedSource {
        documents: vec![Document::new(content).with_title(title)],
        size_bytes,
    }
}

/// Load a dataset export, one document per record, using `column` as the
/// content. Accepts a JSON array of objects or JSON lines.
///
/// Records where `column` is absent or null are skipped. A column that no
/// record has, or that holds a non-string value, is `UnknownColumn`.
pub fn load_dataset(path: &Path, column: &str) -> Result<LoadedSource> {
    let raw = std::fs::read_to_string(path)?;
    let size_bytes = std::fs::metadata(path)?.len();
    let records = parse_records(&raw)?;
    let available = available_columns(&records);

    if !available.iter().any(|c| c == column) {
        return Err(Error::UnknownColumn {
            column: column.to_string(),
            available,
        });
    }

    let mut documents = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in &records {
        let content = match record.get(column) {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => {
                skipped += 1;
                continue;
            }
            Some(_) => {
                return Err(Error::UnknownColumn {
                    column: column.to_string(),
                    available: string_columns(&records),
                })
            }
        };

        let mut doc = Document::new(content);
        if let Some(title) = record.get("title").and_then(Value::as_str) {
            doc = doc.with_title(title);
        }
        if let Some(source) = record.get("source").and_then(Value::as_str) {
            doc = doc.with_source(source);
        }
        documents.push(doc);
    }

    info!(
        "Loaded dataset {}: {} records, column '{}' ({} skipped)",
        path.display(),
        documents.len(),
        column,
        skipped
    );
    Ok(LoadedSource {
        documents,
        size_bytes,
    })
}

/// Union of keys across all records, sorted.
pub fn available_columns(records: &[Map<String, Value>]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Columns whose values are strings (or null) in every record that has them.
fn string_columns(records: &[Map<String, Value>]) -> Vec<String> {
    available_columns(records)
        .into_iter()
        .filter(|col| {
            records
                .iter()
                .filter_map(|r| r.get(col))
                .all(|v| v.is_string() || v.is_null())
        })
        .collect()
}

fn parse_records(raw: &str) -> Result<Vec<Map<String, Value>>> {
    let trimmed = raw.trim_start();
    let values: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<std::result::Result<_, _>>()?
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Value::Object(map) => Ok(map),
            other => Err(Error::Ingest(format!(
                "record {} is not an object: {}",
                i, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "sky.txt", "The sky is blue.");
        let loaded = load_text_file(&path).unwrap();
        assert_eq!(loaded.size_bytes, 16);
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.documents[0].metadata.title.as_deref(), Some("sky.txt"));
    }

    #[test]
    fn test_load_json_array_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "wiki.json",
            r#"[{"text": "alpha", "title": "A"}, {"text": "beta", "source": "wiki"}, {"title": "no text"}]"#,
        );
        let loaded = load_dataset(&path, "text").unwrap();
        assert_eq!(loaded.documents.len(), 2);
        assert_eq!(loaded.documents[0].metadata.title.as_deref(), Some("A"));
        assert_eq!(loaded.documents[1].metadata.source.as_deref(), Some("wiki"));
    }

    #[test]
    fn test_load_jsonl_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "chat.jsonl",
            "{\"message\": \"hi\"}\n\n{\"message\": \"there\"}\n",
        );
        let loaded = load_dataset(&path, "message").unwrap();
        let contents: Vec<_> = loaded.documents.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "there"]);
    }

    #[test]
    fn test_unknown_column_lists_valid_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "d.json", r#"[{"text": "a", "title": "t"}]"#);
        match load_dataset(&path, "body") {
            Err(Error::UnknownColumn { column, available }) => {
                assert_eq!(column, "body");
                assert_eq!(available, vec!["text".to_string(), "title".to_string()]);
            }
            other => panic!("expected UnknownColumn, got {:?}", other.map(|l| l.documents.len())),
        }
    }

    #[test]
    fn test_non_string_column_is_unknown_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "d.json", r#"[{"text": "a", "score": 3}]"#);
        match load_dataset(&path, "score") {
            Err(Error::UnknownColumn { available, .. }) => {
                assert_eq!(available, vec!["text".to_string()]);
            }
            _ => panic!("expected UnknownColumn"),
        }
    }

    #[test]
    fn test_non_object_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "d.json", r#"["just a string"]"#);
        assert!(matches!(load_dataset(&path, "text"), Err(Error::Ingest(_))));
    }

    #[test]
    fn test_missing_dataset_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(&dir.path().join("missing.json"), "text").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_text_document_size() {
        let loaded = text_document("note", "The sky is blue.".to_string());
        assert_eq!(loaded.size_bytes, 16);
        assert_eq!(loaded.documents[0].metadata.title.as_deref(), Some("note"));
    }
}
