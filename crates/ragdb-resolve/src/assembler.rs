//! Query/prompt assembler.

use std::sync::Arc;

use ragdb_core::{Error, Result};
use ragdb_infer::Embedder;
use ragdb_store::{ScoredChunk, VectorIndex};
use tracing::{debug, info};

use crate::rerank::{PassthroughReranker, Reranker};
use crate::types::{AnsweredContext, ContextOutcome};

/// First line of every rendered context block.
pub const CONTEXT_HEADER: &str = "\nExtracted documents:\n";

/// Retrieves, reranks and renders context for a query.
pub struct ContextAssembler {
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
}

impl ContextAssembler {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_reranker(embedder, Arc::new(PassthroughReranker))
    }

    pub fn with_reranker(embedder: Arc<dyn Embedder>, reranker: Arc<dyn Reranker>) -> Self {
        Self { embedder, reranker }
    }

    /// Assemble context for `query` from `index`.
    ///
    /// Returns `EmptyDatabase` when there is no index. A blank query skips
    /// retrieval and yields an empty context.
    pub fn answer_context(
        &self,
        index: Option<&VectorIndex>,
        query: &str,
        k_retrieved: usize,
        k_final: usize,
    ) -> Result<AnsweredContext> {
        let index = index.ok_or(Error::EmptyDatabase)?;

        if query.trim().is_empty() {
            info!("Empty query, skipping retrieval");
            return Ok(AnsweredContext::empty_query());
        }

        let retrieved = index.similarity_search(query, k_retrieved, self.embedder.as_ref())?;
        debug!("Retrieved {} chunks for query", retrieved.len());

        let chunks = self.reranker.rerank(query, retrieved, k_final)?;
        Ok(AnsweredContext {
            outcome: ContextOutcome::Retrieved,
            context: render_context(&chunks),
            chunks,
        })
    }
}

/// Render chunks as numbered document blocks, in the order given.
pub fn render_context(chunks: &[ScoredChunk]) -> String {
    let mut context = String::from(CONTEXT_HEADER);
    for (i, scored) in chunks.iter().enumerate() {
        context.push_str(&format!("Document {}:::\n", i));
        if let Some(title) = &scored.chunk.metadata.title {
            context.push_str(title);
            context.push('\n');
        }
        context.push_str(&scored.chunk.content);
        context.push('\n');
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_infer::HashingEmbedder;
    use ragdb_store::{Chunk, Distance, DocumentMetadata};

    fn index_of(embedder: &HashingEmbedder, docs: &[(&str, Option<&str>)]) -> VectorIndex {
        let chunks = docs
            .iter()
            .map(|(text, title)| {
                let meta = DocumentMetadata {
                    title: title.map(str::to_string),
                    source: Some("demo".into()),
                };
                Chunk::new(*text, &meta, 0)
            })
            .collect();
        VectorIndex::from_documents(chunks, embedder, Distance::Cosine).unwrap()
    }

    #[test]
    fn test_no_index_is_empty_database() {
        let assembler = ContextAssembler::new(Arc::new(HashingEmbedder::new(64)));
        let err = assembler.answer_context(None, "hello", 30, 5).unwrap_err();
        assert!(matches!(err, Error::EmptyDatabase));
    }

    #[test]
    fn test_blank_query_skips_retrieval() {
        let embedder = HashingEmbedder::new(64);
        let index = index_of(&embedder, &[("The sky is blue.", None)]);
        let assembler = ContextAssembler::new(Arc::new(embedder));

        let answered = assembler.answer_context(Some(&index), "   ", 30, 5).unwrap();
        assert_eq!(answered.outcome, ContextOutcome::EmptyQuery);
        assert!(answered.context.is_empty());
        assert!(answered.chunks.is_empty());
    }

    #[test]
    fn test_keeps_k_final_in_retrieval_order() {
        let embedder = HashingEmbedder::new(384);
        let index = index_of(
            &embedder,
            &[
                ("Bread needs flour and water", None),
                ("The sky is blue.", Some("Sky")),
                ("The sky turns red at sunset", None),
                ("Tokio schedules futures", None),
            ],
        );
        let assembler = ContextAssembler::new(Arc::new(HashingEmbedder::new(384)));

        let answered = assembler
            .answer_context(Some(&index), "what color is the sky", 30, 2)
            .unwrap();
        assert_eq!(answered.outcome, ContextOutcome::Retrieved);
        assert_eq!(answered.chunks.len(), 2);
        assert!(answered.chunks[0].distance <= answered.chunks[1].distance);
        assert!(answered
            .chunks
            .iter()
            .any(|c| c.chunk.content == "The sky is blue."));
    }

    #[test]
    fn test_render_context_format() {
        let titled = ScoredChunk {
            chunk: Chunk::new(
                "The sky is blue.",
                &DocumentMetadata {
                    title: Some("Sky".into()),
                    source: None,
                },
                0,
            ),
            distance: 0.1,
        };
        let bare = ScoredChunk {
            chunk: Chunk::new("Grass is green.", &DocumentMetadata::default(), 0),
            distance: 0.2,
        };

        let rendered = render_context(&[titled, bare]);
        assert_eq!(
            rendered,
            "\nExtracted documents:\nDocument 0:::\nSky\nThe sky is blue.\nDocument 1:::\nGrass is green.\n"
        );
    }
}
