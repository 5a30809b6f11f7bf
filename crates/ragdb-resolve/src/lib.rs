//! Resolvers: turn a query into a rendered context block.
//!
//! The assembler retrieves nearest chunks from the vector index, hands them
//! to a swappable rerank stage, and renders the survivors for the prompt.
//! It never calls the generation function.

pub mod assembler;
pub mod rerank;
pub mod types;

pub use assembler::{render_context, ContextAssembler, CONTEXT_HEADER};
pub use rerank::{PassthroughReranker, Reranker};
pub use types::*;
