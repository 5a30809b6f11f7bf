//! Data types for documents, chunks, and search results.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata carried from a source record down to every chunk cut from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A unit of source text produced by a loader. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }
}

/// Chunk metadata: the parent document's metadata plus the chunk's position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Byte offset of the chunk inside the parent document's content.
    pub start_index: usize,
}

/// A bounded passage of a document, the unit that gets embedded and indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

impl Chunk {
    pub fn new(content: impl Into<String>, parent: &DocumentMetadata, start_index: usize) -> Self {
        let content = content.into();
        let hash = content_hash(&content);
        Self {
            content,
            metadata: ChunkMetadata {
                title: parent.title.clone(),
                source: parent.source.clone(),
                start_index,
            },
            hash,
        }
    }
}

/// Compute the SHA-256 hex digest of a chunk's content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine distance to the query (0 = identical direction).
    pub distance: f32,
}

/// Distance metric of a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Cosine => write!(f, "cosine"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_inherits_metadata_and_hash() {
        let parent = DocumentMetadata {
            title: Some("Sky".into()),
            source: Some("demo".into()),
        };
        let chunk = Chunk::new("The sky is blue.", &parent, 0);
        assert_eq!(chunk.metadata.title.as_deref(), Some("Sky"));
        assert_eq!(chunk.metadata.source.as_deref(), Some("demo"));
        assert_eq!(chunk.hash.len(), 64);
        assert_eq!(chunk.hash, content_hash("The sky is blue."));
    }

    #[test]
    fn test_document_metadata_omits_missing_fields() {
        let doc = Document::new("text");
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"content":"text","metadata":{}}"#);
    }
}
