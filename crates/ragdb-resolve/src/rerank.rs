//! Post-retrieval rerank stage.

use ragdb_core::Result;
use ragdb_store::ScoredChunk;

/// Reorders and trims retrieved chunks before rendering.
pub trait Reranker: Send + Sync {
    /// Return at most `k` chunks for `query`, best first.
    fn rerank(&self, query: &str, chunks: Vec<ScoredChunk>, k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Keeps the first `k` chunks in retrieval order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

impl Reranker for PassthroughReranker {
    fn rerank(&self, _query: &str, mut chunks: Vec<ScoredChunk>, k: usize) -> Result<Vec<ScoredChunk>> {
        chunks.truncate(k);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_store::{Chunk, DocumentMetadata};

    #[test]
    fn test_passthrough_keeps_order_and_truncates() {
        let chunks: Vec<ScoredChunk> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, t)| ScoredChunk {
                chunk: Chunk::new(*t, &DocumentMetadata::default(), 0),
                distance: 0.9 - i as f32 * 0.1,
            })
            .collect();

        let kept = PassthroughReranker.rerank("q", chunks, 2).unwrap();
        let contents: Vec<_> = kept.iter().map(|c| c.chunk.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }
}
