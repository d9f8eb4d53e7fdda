//! Ingestion and retrieval core: splits uploaded study material into
//! overlapping chunks, embeds them, and serves tenant-isolated
//! nearest-neighbor retrieval over a shared vector index.

pub mod chunker;
pub mod engine;
pub mod error;
pub mod types;

pub use chunker::{RecursiveSplitter, SplitterConfig};
pub use engine::RagEngine;
pub use error::{ChunkerConfigError, RagError};
pub use types::{ChunkMetadata, DocumentDescriptor, IndexStats, RetrievedContext, Source};
