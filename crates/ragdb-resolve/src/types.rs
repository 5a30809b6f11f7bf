//! Resolver types.

use ragdb_core::Error;
use ragdb_store::ScoredChunk;
use serde::Serialize;

/// How a context request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextOutcome {
    /// Chunks were retrieved and rendered.
    Retrieved,
    /// The query was blank; retrieval was skipped.
    EmptyQuery,
    /// No index exists yet.
    EmptyDatabase,
}

/// Rendered context plus the chunks it was built from, in retrieval order.
#[derive(Debug, Clone, Serialize)]
pub struct AnsweredContext {
    pub outcome: ContextOutcome,
    pub context: String,
    pub chunks: Vec<ScoredChunk>,
}

impl AnsweredContext {
    /// Sentinel returned when there is nothing to search.
    pub fn empty_database() -> Self {
        Self {
            outcome: ContextOutcome::EmptyDatabase,
            context: Error::EmptyDatabase.to_string(),
            chunks: Vec::new(),
        }
    }

    pub fn empty_query() -> Self {
        Self {
            outcome: ContextOutcome::EmptyQuery,
            context: String::new(),
            chunks: Vec::new(),
        }
    }

    /// Whether the context carries retrieved documents.
    pub fn has_documents(&self) -> bool {
        self.outcome == ContextOutcome::Retrieved && !self.chunks.is_empty()
    }
}
