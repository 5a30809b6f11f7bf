//! Token-bounded recursive text chunking.
//!
//! Splits on the first separator (in priority order) that occurs in the text,
//! keeping the separator at the start of the following piece. Pieces below
//! the token budget are merged back together with a running overlap; larger
//! pieces are split again with the remaining separators, down to single
//! characters.

use std::collections::{HashSet, VecDeque};

use once_cell::sync::Lazy;
use ragdb_core::TokenCounter;
use ragdb_store::{Chunk, Document};
use regex::Regex;
use tracing::{debug, warn};

/// Default chunk size in tokens.
pub const DEFAULT_CHUNK_SIZE: usize = ragdb_core::config::DEFAULT_CHUNK_SIZE;

/// Separator patterns, highest priority first. Exhausting them falls back
/// to splitting into characters.
pub const MARKDOWN_SEPARATORS: &[&str] = &[
    r"\n#{1,6} ",
    r"```\n",
    r"\n\*\*\*+\n",
    r"\n---+\n",
    r"\n___+\n",
    r"\n\n",
    r"\n",
    r" ",
];

static SEPARATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    MARKDOWN_SEPARATORS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// Overlap used for a given chunk size.
pub fn default_overlap(chunk_size: usize) -> usize {
    chunk_size / 10
}

/// Recursive chunker measuring length in tokens of the embedding model.
pub struct RecursiveChunker<'a> {
    chunk_size: usize,
    chunk_overlap: usize,
    tokens: &'a dyn TokenCounter,
}

impl<'a> RecursiveChunker<'a> {
    pub fn new(chunk_size: usize, tokens: &'a dyn TokenCounter) -> Self {
        Self {
            chunk_size,
            chunk_overlap: default_overlap(chunk_size),
            tokens,
        }
    }

    pub fn with_overlap(mut self, chunk_overlap: usize) -> Self {
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Split `text` into stripped, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    /// Split every document, recording each chunk's byte offset in its parent.
    pub fn split_document(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.content.as_str();
        let mut search_from = 0usize;
        let mut chunks = Vec::new();

        for piece in self.split_text(text) {
            let start = text
                .get(search_from..)
                .and_then(|rest| rest.find(&piece))
                .map(|i| search_from + i)
                .or_else(|| text.find(&piece))
                .unwrap_or(0);

            search_from = start + piece.chars().next().map_or(1, char::len_utf8);
            chunks.push(Chunk::new(piece, &doc.metadata, start));
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[Regex]) -> Vec<String> {
        let chosen = separators
            .iter()
            .position(|re| re.is_match(text));

        let (splits, remaining): (Vec<&str>, Option<&[Regex]>) = match chosen {
            Some(i) => (split_keep_start(text, &separators[i]), Some(&separators[i + 1..])),
            None => (split_chars(text), None),
        };

        let mut final_chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();

        for piece in splits {
            if self.tokens.count_tokens(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }
            match remaining {
                Some(rest) => final_chunks.extend(self.split_recursive(piece, rest)),
                None => final_chunks.push(piece.to_string()),
            }
        }

        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }
        final_chunks
    }

    /// Merge small pieces into chunks of at most `chunk_size` tokens, carrying
    /// up to `chunk_overlap` tokens from the end of one chunk into the next.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = self.tokens.count_tokens(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of {} tokens, longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match current.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }

            current.push_back((piece, len));
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }
        docs
    }
}

fn join_pieces(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split at every match of `re`, attaching the match to the following piece.
fn split_keep_start<'t>(text: &'t str, re: &Regex) -> Vec<&'t str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            pieces.push(&text[last..m.start()]);
        }
        last = m.start();
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

fn split_chars(text: &str) -> Vec<&str> {
    text.char_indices()
        .map(|(i, c)| &text[i..i + c.len_utf8()])
        .collect()
}

/// Chunk a batch of documents and drop repeated chunk contents.
///
/// The first occurrence of each content wins, across the whole batch.
pub fn split_documents(documents: &[Document], chunk_size: usize, tokens: &dyn TokenCounter) -> Vec<Chunk> {
    let chunker = RecursiveChunker::new(chunk_size, tokens);
    // Keyed by content hash; equal hashes mean equal text.
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();
    let mut total = 0usize;

    for doc in documents {
        for chunk in chunker.split_document(doc) {
            total += 1;
            if seen.insert(chunk.hash.clone()) {
                unique.push(chunk);
            }
        }
    }

    debug!(
        "Split {} documents into {} chunks ({} duplicates dropped)",
        documents.len(),
        unique.len(),
        total - unique.len()
    );
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::{CharTokenCounter, WordTokenCounter};

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let docs = vec![Document::new("The sky is blue.").with_source("demo")];
        let chunks = split_documents(&docs, 512, &WordTokenCounter);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "The sky is blue.");
        assert_eq!(chunks[0].metadata.start_index, 0);
        assert_eq!(chunks[0].metadata.source.as_deref(), Some("demo"));
    }

    #[test]
    fn test_chunks_respect_token_budget() {
        let text = format!(
            "# Title\n\n{}\n\n## Section\n\n{}\n```\nfn main() {{}}\n```\n{}",
            numbered_words(300),
            numbered_words(150),
            numbered_words(80)
        );
        let tokens = WordTokenCounter;
        let chunker = RecursiveChunker::new(40, &tokens);
        let chunks = chunker.split_text(&text);
        assert!(chunks.len() > 5);
        for c in &chunks {
            assert!(tokens.count_tokens(c) <= 40, "chunk too long: {:?}", c);
            assert!(!c.is_empty());
            assert_eq!(c.trim(), c);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = numbered_words(60);
        let tokens = WordTokenCounter;
        let chunks = RecursiveChunker::new(20, &tokens).split_text(&text);

        assert!(chunks.len() >= 3);
        assert!(chunks[0].starts_with("w0 "));
        assert!(chunks[0].ends_with(" w19"));
        assert!(chunks[1].starts_with("w18 w19 "));
    }

    #[test]
    fn test_header_separator_kept_with_following_piece() {
        let text = format!("{}\n## Second\n{}", numbered_words(12), numbered_words(12));
        let tokens = WordTokenCounter;
        let chunks = RecursiveChunker::new(20, &tokens).split_text(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with("## Second"));
    }

    #[test]
    fn test_start_index_points_at_content() {
        let text = format!("{}\n\n{}", numbered_words(50), numbered_words(50));
        let doc = Document::new(text.clone());
        let tokens = WordTokenCounter;
        let chunks = RecursiveChunker::new(16, &tokens).split_document(&doc);

        let mut last = 0;
        for (i, c) in chunks.iter().enumerate() {
            let start = c.metadata.start_index;
            assert_eq!(&text[start..start + c.content.len()], c.content);
            if i > 0 {
                assert!(start > last);
            }
            last = start;
        }
    }

    #[test]
    fn test_character_fallback_terminates() {
        let text = "x".repeat(100);
        let tokens = CharTokenCounter;
        let chunks = RecursiveChunker::new(10, &tokens).split_text(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[0].len(), 10);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let docs = vec![
            Document::new("The sky is blue.").with_title("a"),
            Document::new("The sky is blue.").with_title("b"),
            Document::new("Grass is green."),
        ];
        let once = split_documents(&docs, 512, &WordTokenCounter);
        assert_eq!(once.len(), 2);
        assert_eq!(once[0].metadata.title.as_deref(), Some("a"));

        let again: Vec<Document> = once.iter().map(|c| Document::new(c.content.clone())).collect();
        let twice = split_documents(&again, 512, &WordTokenCounter);
        let a: Vec<_> = once.iter().map(|c| &c.content).collect();
        let b: Vec<_> = twice.iter().map(|c| &c.content).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedup_keeps_near_duplicates() {
        let docs = vec![
            Document::new("The sky is blue."),
            Document::new("the sky is blue."),
            Document::new("The sky is blue."),
        ];
        let chunks = split_documents(&docs, 512, &WordTokenCounter);
        assert_eq!(chunks.len(), 2);
        assert_ne!(chunks[0].hash, chunks[1].hash);
    }

    #[test]
    fn test_empty_and_blank_documents_yield_nothing() {
        let docs = vec![Document::new(""), Document::new("   \n\n  ")];
        assert!(split_documents(&docs, 512, &WordTokenCounter).is_empty());
    }

    #[test]
    fn test_default_overlap() {
        assert_eq!(default_overlap(DEFAULT_CHUNK_SIZE), 51);
    }
}
