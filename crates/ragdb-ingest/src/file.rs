//! Text extraction for uploaded files.

use ragdb_core::{Error, Result};
use std::path::Path;

/// Supported file types for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Markdown,
    Code,
    Json,
    Pdf,
    Unknown,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" => Self::PlainText,
            "md" | "mdx" => Self::Markdown,
            "py" | "js" | "ts" | "tsx" | "jsx" | "rs" | "go" | "java" | "cpp" | "c" | "h"
            | "hpp" | "cs" | "rb" | "php" | "swift" | "kt" | "scala" | "sh" | "bash" | "zsh"
            | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "xml" | "html" | "css"
            | "scss" | "sql" => Self::Code,
            "json" | "jsonl" => Self::Json,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    pub fn of(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }
}

/// Read the text content of an uploaded file.
///
/// Known text formats are read as UTF-8. Unknown extensions are accepted
/// when they decode and are not mostly control characters. PDFs and binary
/// files are rejected with `Ingest`.
pub fn extract_text(path: &Path) -> Result<String> {
    match FileType::of(path) {
        FileType::PlainText | FileType::Markdown | FileType::Code | FileType::Json => {
            Ok(std::fs::read_to_string(path)?)
        }
        FileType::Pdf => Err(Error::Ingest(format!(
            "PDF extraction is not supported: {}",
            path.display()
        ))),
        FileType::Unknown => {
            let bytes = std::fs::read(path)?;
            let content = String::from_utf8(bytes)
                .map_err(|_| Error::Ingest(format!("{} is not UTF-8 text", path.display())))?;
            if looks_binary(&content) {
                return Err(Error::Ingest(format!("{} looks like a binary file", path.display())));
            }
            Ok(content)
        }
    }
}

fn looks_binary(content: &str) -> bool {
    content
        .chars()
        .filter(|c| c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        .count()
        > content.len() / 10
}
