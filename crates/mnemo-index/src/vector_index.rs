use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index not opened")]
    NotOpened,
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("count error: {0}")]
    Count(String),
    #[error("scroll error: {0}")]
    Scroll(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One indexed entry: caller-chosen id, embedding, and arbitrary JSON payload.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Exact-match conjunction over payload fields.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    pub must: Vec<FieldCondition>,
}

impl IndexFilter {
    #[must_use]
    pub fn matching(field: impl Into<String>, value: FieldValue) -> Self {
        Self {
            must: vec![FieldCondition {
                field: field.into(),
                value,
            }],
        }
    }

    #[must_use]
    pub fn and(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.must.push(FieldCondition {
            field: field.into(),
            value,
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Matches when the payload value equals any listed string.
    AnyOf(Vec<String>),
}

/// A query hit. `distance` is cosine distance; similarity = `1 - distance`.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub distance: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorIndex: Send + Sync {
    /// Create or verify the backing collection. Every other operation fails
    /// with [`IndexError::NotOpened`] until this has succeeded once.
    fn open(&self, vector_size: u64) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Write or overwrite entries by id; entries are queryable on return.
    fn upsert(&self, records: Vec<VectorRecord>) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Nearest-neighbor search restricted to entries matching `filter`,
    /// ranked best first.
    fn query(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<IndexFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, IndexError>>;

    /// Remove entries; unknown ids are ignored.
    fn delete(&self, ids: Vec<String>) -> BoxFuture<'_, Result<(), IndexError>>;

    /// Number of entries matching `filter`, or the total when omitted.
    fn count(&self, filter: Option<IndexFilter>) -> BoxFuture<'_, Result<u64, IndexError>>;

    /// Ids of all entries matching `filter`; payload-only, no vectors read.
    fn list_ids(&self, filter: IndexFilter) -> BoxFuture<'_, Result<Vec<String>, IndexError>>;
}

impl<T: VectorIndex + ?Sized> VectorIndex for std::sync::Arc<T> {
    fn open(&self, vector_size: u64) -> BoxFuture<'_, Result<(), IndexError>> {
        (**self).open(vector_size)
    }

    fn upsert(&self, records: Vec<VectorRecord>) -> BoxFuture<'_, Result<(), IndexError>> {
        (**self).upsert(records)
    }

    fn query(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<IndexFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, IndexError>> {
        (**self).query(vector, limit, filter)
    }

    fn delete(&self, ids: Vec<String>) -> BoxFuture<'_, Result<(), IndexError>> {
        (**self).delete(ids)
    }

    fn count(&self, filter: Option<IndexFilter>) -> BoxFuture<'_, Result<u64, IndexError>> {
        (**self).count(filter)
    }

    fn list_ids(&self, filter: IndexFilter) -> BoxFuture<'_, Result<Vec<String>, IndexError>> {
        (**self).list_ids(filter)
    }
}
