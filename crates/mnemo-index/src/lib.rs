//! Persistent, filterable nearest-neighbor storage for document chunks.
//!
//! One global collection holds chunks from all tenants; callers scope every
//! query with metadata filters (at minimum the tenant key). The
//! [`VectorIndex`] trait is object-safe; [`QdrantIndex`] is the production
//! backend and [`InMemoryIndex`] serves tests and local development.

pub mod in_memory;
pub mod qdrant;
pub mod vector_index;

pub use in_memory::InMemoryIndex;
pub use qdrant::QdrantIndex;
pub use vector_index::{
    FieldCondition, FieldValue, IndexError, IndexFilter, ScoredRecord, VectorIndex, VectorRecord,
};
