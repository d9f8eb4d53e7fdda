use std::collections::HashMap;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::vector_index::{
    FieldValue, IndexError, IndexFilter, ScoredRecord, VectorIndex, VectorRecord,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredRecord {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

/// Brute-force cosine index kept in insertion order.
///
/// Backs tests and local development; `open` installs the record list and
/// every operation before it fails with [`IndexError::NotOpened`]. Upserting
/// an existing id replaces the record in place, so ranking ties keep first
/// insertion order.
pub struct InMemoryIndex {
    records: RwLock<Option<Vec<StoredRecord>>>,
}

impl InMemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(None),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &IndexFilter) -> bool {
    filter.must.iter().all(|cond| {
        payload
            .get(&cond.field)
            .is_some_and(|val| field_matches(val, &cond.value))
    })
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
        FieldValue::Integer(i) => val.as_i64() == Some(*i),
        FieldValue::AnyOf(set) => val
            .as_str()
            .is_some_and(|s| set.iter().any(|candidate| candidate == s)),
    }
}

impl InMemoryIndex {
    fn with_records<T>(&self, f: impl FnOnce(&[StoredRecord]) -> T) -> Result<T, IndexError> {
        let guard = self
            .records
            .read()
            .map_err(|e| IndexError::Collection(e.to_string()))?;
        let records = guard.as_ref().ok_or(IndexError::NotOpened)?;
        Ok(f(records))
    }
}

impl VectorIndex for InMemoryIndex {
    fn open(&self, _vector_size: u64) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            let mut guard = self
                .records
                .write()
                .map_err(|e| IndexError::Collection(e.to_string()))?;
            if guard.is_none() {
                *guard = Some(Vec::new());
            }
            Ok(())
        })
    }

    fn upsert(&self, records: Vec<VectorRecord>) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            let mut guard = self
                .records
                .write()
                .map_err(|e| IndexError::Upsert(e.to_string()))?;
            let stored = guard.as_mut().ok_or(IndexError::NotOpened)?;
            for record in records {
                let replacement = StoredRecord {
                    id: record.id,
                    vector: record.vector,
                    payload: record.payload,
                };
                match stored.iter().position(|r| r.id == replacement.id) {
                    Some(i) => stored[i] = replacement,
                    None => stored.push(replacement),
                }
            }
            Ok(())
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<IndexFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredRecord>, IndexError>> {
        Box::pin(async move {
            let empty = IndexFilter::default();
            let filter = filter.unwrap_or(empty);
            let mut scored = self.with_records(|records| {
                records
                    .iter()
                    .filter(|r| matches_filter(&r.payload, &filter))
                    .map(|r| ScoredRecord {
                        id: r.id.clone(),
                        distance: 1.0 - cosine_similarity(&vector, &r.vector),
                        payload: r.payload.clone(),
                    })
                    .collect::<Vec<_>>()
            })?;

            // stable sort keeps insertion order on ties
            scored.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(limit);
            Ok(scored)
        })
    }

    fn delete(&self, ids: Vec<String>) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut guard = self
                .records
                .write()
                .map_err(|e| IndexError::Delete(e.to_string()))?;
            let stored = guard.as_mut().ok_or(IndexError::NotOpened)?;
            let doomed: HashSet<&String> = ids.iter().collect();
            stored.retain(|r| !doomed.contains(&r.id));
            Ok(())
        })
    }

    fn count(&self, filter: Option<IndexFilter>) -> BoxFuture<'_, Result<u64, IndexError>> {
        Box::pin(async move {
            let matched = self.with_records(|records| match &filter {
                Some(f) => records
                    .iter()
                    .filter(|r| matches_filter(&r.payload, f))
                    .count(),
                None => records.len(),
            })?;
            Ok(matched as u64)
        })
    }

    fn list_ids(&self, filter: IndexFilter) -> BoxFuture<'_, Result<Vec<String>, IndexError>> {
        Box::pin(async move {
            self.with_records(|records| {
                records
                    .iter()
                    .filter(|r| matches_filter(&r.payload, &filter))
                    .map(|r| r.id.clone())
                    .collect()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, vector: Vec<f32>, user: &str) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            vector,
            payload: HashMap::from([("user_id".into(), serde_json::json!(user))]),
        }
    }

    async fn open_index() -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index.open(3).await.unwrap();
        index
    }

    #[tokio::test]
    async fn operations_fail_before_open() {
        let index = InMemoryIndex::new();
        let err = index.count(None).await.unwrap_err();
        assert!(matches!(err, IndexError::NotOpened));
        let err = index
            .upsert(vec![record("a", vec![1.0, 0.0, 0.0], "u1")])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NotOpened));
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let index = open_index().await;
        index
            .upsert(vec![record("a", vec![1.0, 0.0, 0.0], "u1")])
            .await
            .unwrap();
        index.open(3).await.unwrap();
        assert_eq!(index.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_and_query_ranked() {
        let index = open_index().await;
        index
            .upsert(vec![
                record("a", vec![1.0, 0.0, 0.0], "u1"),
                record("b", vec![0.0, 1.0, 0.0], "u1"),
            ])
            .await
            .unwrap();

        let results = index.query(vec![1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!(results[0].distance.abs() < f32::EPSILON);
        assert!(results[1].distance > results[0].distance);
    }

    #[tokio::test]
    async fn upsert_same_id_replaces() {
        let index = open_index().await;
        index
            .upsert(vec![record("a", vec![1.0, 0.0, 0.0], "u1")])
            .await
            .unwrap();
        index
            .upsert(vec![record("a", vec![0.0, 1.0, 0.0], "u1")])
            .await
            .unwrap();

        assert_eq!(index.count(None).await.unwrap(), 1);
        let results = index.query(vec![0.0, 1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].id, "a");
        assert!(results[0].distance.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let index = open_index().await;
        index
            .upsert(vec![
                record("first", vec![1.0, 0.0, 0.0], "u1"),
                record("second", vec![1.0, 0.0, 0.0], "u1"),
            ])
            .await
            .unwrap();

        let results = index.query(vec![1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results[0].id, "first");
        assert_eq!(results[1].id, "second");
    }

    #[tokio::test]
    async fn query_with_text_filter() {
        let index = open_index().await;
        index
            .upsert(vec![
                record("a", vec![1.0, 0.0, 0.0], "u1"),
                record("b", vec![1.0, 0.0, 0.0], "u2"),
            ])
            .await
            .unwrap();

        let filter = IndexFilter::matching("user_id", FieldValue::Text("u2".into()));
        let results = index
            .query(vec![1.0, 0.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn any_of_filter_matches_set() {
        let index = open_index().await;
        let with_doc = |id: &str, doc: &str| VectorRecord {
            id: id.into(),
            vector: vec![1.0, 0.0, 0.0],
            payload: HashMap::from([("document_id".into(), serde_json::json!(doc))]),
        };
        index
            .upsert(vec![
                with_doc("a", "d1"),
                with_doc("b", "d2"),
                with_doc("c", "d3"),
            ])
            .await
            .unwrap();

        let filter = IndexFilter::matching(
            "document_id",
            FieldValue::AnyOf(vec!["d1".into(), "d3".into()]),
        );
        let mut ids = index.list_ids(filter).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn delete_ignores_unknown_ids() {
        let index = open_index().await;
        index
            .upsert(vec![record("a", vec![1.0, 0.0, 0.0], "u1")])
            .await
            .unwrap();
        index
            .delete(vec!["a".into(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(index.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn count_with_filter() {
        let index = open_index().await;
        index
            .upsert(vec![
                record("a", vec![1.0, 0.0, 0.0], "u1"),
                record("b", vec![0.0, 1.0, 0.0], "u1"),
                record("c", vec![0.0, 0.0, 1.0], "u2"),
            ])
            .await
            .unwrap();

        let filter = IndexFilter::matching("user_id", FieldValue::Text("u1".into()));
        assert_eq!(index.count(Some(filter)).await.unwrap(), 2);
        assert_eq!(index.count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn query_under_filled_when_few_match() {
        let index = open_index().await;
        index
            .upsert(vec![record("a", vec![1.0, 0.0, 0.0], "u1")])
            .await
            .unwrap();
        let results = index.query(vec![1.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn cosine_similarity_zero_norm() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }
}
