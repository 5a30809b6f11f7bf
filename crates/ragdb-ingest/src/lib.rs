//! RagDB Ingest: token-bounded chunking, file and dataset loaders.

pub mod chunking;
pub mod file;
pub mod source;

pub use chunking::{split_documents, RecursiveChunker, DEFAULT_CHUNK_SIZE, MARKDOWN_SEPARATORS};
pub use source::{available_columns, load_dataset, load_text_file, text_document, LoadedSource, DEFAULT_COLUMN};
