//! RagDB Store: append-only vector index + dataset manifest on disk.

pub mod index;
pub mod manifest;
pub mod persist;
pub mod types;

pub use index::{VectorIndex, INDEX_META_FILE, INDEX_VEC_FILE};
pub use manifest::{size_in_mb, DatasetManifest, MANIFEST_FILE};
pub use persist::atomic_write;
pub use types::*;
