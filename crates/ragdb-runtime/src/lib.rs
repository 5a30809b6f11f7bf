//! Runtime: the RAG index manager.
//!
//! Owns the live vector index and dataset manifest, runs the ingestion
//! pipeline (chunk → embed → merge → persist), answers context queries and
//! wipes the database. One ingestion or wipe runs at a time; readers wait
//! behind an in-flight mutation instead of racing it.

pub mod manager;
pub mod types;

pub use manager::{ManagerOptions, RagManager};
pub use ragdb_resolve::{AnsweredContext, ContextOutcome};
pub use types::*;
