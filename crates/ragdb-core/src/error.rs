//! Error types for RagDB.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source '{0}' already exists in the database")]
    DuplicateSource(String),

    #[error("Unknown column '{column}', valid columns are: {}", available.join(", "))]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Incompatible index: {0}")]
    IncompatibleIndex(String),

    #[error("The database is empty, populate it with a dataset first")]
    EmptyDatabase,

    #[error("Another ingestion or wipe is already running")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors the caller can recover from by changing its request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSource(_)
                | Self::UnknownColumn { .. }
                | Self::EmptyDatabase
                | Self::Busy
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_lists_valid_columns() {
        let err = Error::UnknownColumn {
            column: "body".into(),
            available: vec!["text".into(), "title".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown column 'body', valid columns are: text, title"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_io_is_not_recoverable() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(!err.is_recoverable());
    }
}
