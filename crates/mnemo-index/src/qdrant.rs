use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, ScoredPoint, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder, value::Kind,
};
use uuid::Uuid;

use crate::vector_index::{
    FieldCondition, FieldValue, IndexError, IndexFilter, ScoredRecord, VectorIndex, VectorRecord,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Payload key carrying the caller-chosen record id.
///
/// Qdrant point ids must be UUIDs or integers, so the caller's id maps to a
/// deterministic UUIDv5 point id and the original string rides along in the
/// payload. Re-upserting the same record id therefore overwrites in place.
const RECORD_ID_KEY: &str = "record_id";

const SCROLL_PAGE: u32 = 256;

/// Qdrant-backed index over one cosine-distance collection.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    opened: AtomicBool,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

fn point_uuid(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

impl QdrantIndex {
    /// Create a client for the given Qdrant URL and collection name.
    ///
    /// The collection itself is created by [`VectorIndex::open`].
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
            opened: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), IndexError> {
        if self.opened.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(IndexError::NotOpened)
        }
    }
}

fn filter_to_qdrant(filter: IndexFilter) -> Filter {
    Filter::must(filter.must.into_iter().map(condition_to_qdrant))
}

fn condition_to_qdrant(cond: FieldCondition) -> Condition {
    match cond.value {
        FieldValue::Text(v) => Condition::matches(cond.field, v),
        FieldValue::Integer(v) => Condition::matches(cond.field, v),
        FieldValue::AnyOf(values) => Condition::matches(cond.field, values),
    }
}

fn scored_point_to_record(point: ScoredPoint) -> ScoredRecord {
    let mut payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = payload
        .remove(RECORD_ID_KEY)
        .and_then(|v| v.as_str().map(ToOwned::to_owned))
        .unwrap_or_default();

    ScoredRecord {
        id,
        // Qdrant reports cosine similarity; callers get a distance.
        distance: 1.0 - point.score,
        payload,
    }
}

impl VectorIndex for QdrantIndex {
    fn open(&self, vector_size: u64) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&self.collection)
                .await
                .map_err(|e| IndexError::Collection(e.to_string()))?;
            if !exists {
                self.client
                    .create_collection(
                        CreateCollectionBuilder::new(&self.collection).vectors_config(
                            VectorParamsBuilder::new(vector_size, Distance::Cosine),
                        ),
                    )
                    .await
                    .map_err(|e| IndexError::Collection(e.to_string()))?;
                tracing::debug!(collection = %self.collection, vector_size, "collection created");
            }
            self.opened.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn upsert(&self, records: Vec<VectorRecord>) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut points = Vec::with_capacity(records.len());
            for record in records {
                let mut payload = record.payload;
                payload.insert(RECORD_ID_KEY.into(), serde_json::json!(record.id));
                let payload_map: HashMap<String, qdrant_client::qdrant::Value> =
                    serde_json::from_value(serde_json::Value::Object(
                        payload.into_iter().collect(),
                    ))
                    .map_err(|e| IndexError::Serialization(e.to_string()))?;
                points.push(PointStruct::new(
                    point_uuid(&record.id),
                    record.vector,
                    payload_map,
                ));
            }
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(|e| IndexError::Upsert(e.to_string()))?;
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
            self.ensure_open()?;
            let limit = u64::try_from(limit).map_err(|e| IndexError::Search(e.to_string()))?;
            let mut builder =
                SearchPointsBuilder::new(&self.collection, vector, limit).with_payload(true);
            if let Some(f) = filter {
                builder = builder.filter(filter_to_qdrant(f));
            }
            let results = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| IndexError::Search(e.to_string()))?;
            Ok(results
                .result
                .into_iter()
                .map(scored_point_to_record)
                .collect())
        })
    }

    fn delete(&self, ids: Vec<String>) -> BoxFuture<'_, Result<(), IndexError>> {
        Box::pin(async move {
            self.ensure_open()?;
            if ids.is_empty() {
                return Ok(());
            }
            let point_ids: Vec<PointId> = ids
                .iter()
                .map(|id| PointId::from(point_uuid(id)))
                .collect();
            self.client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection)
                        .points(PointsIdsList { ids: point_ids })
                        .wait(true),
                )
                .await
                .map_err(|e| IndexError::Delete(e.to_string()))?;
            Ok(())
        })
    }

    fn count(&self, filter: Option<IndexFilter>) -> BoxFuture<'_, Result<u64, IndexError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let mut builder = CountPointsBuilder::new(&self.collection).exact(true);
            if let Some(f) = filter {
                builder = builder.filter(filter_to_qdrant(f));
            }
            let response = self
                .client
                .count(builder)
                .await
                .map_err(|e| IndexError::Count(e.to_string()))?;
            Ok(response.result.map_or(0, |r| r.count))
        })
    }

    fn list_ids(&self, filter: IndexFilter) -> BoxFuture<'_, Result<Vec<String>, IndexError>> {
        Box::pin(async move {
            self.ensure_open()?;
            let qdrant_filter = filter_to_qdrant(filter);
            let mut ids = Vec::new();
            let mut offset: Option<PointId> = None;

            loop {
                let mut builder = ScrollPointsBuilder::new(&self.collection)
                    .filter(qdrant_filter.clone())
                    .with_payload(true)
                    .with_vectors(false)
                    .limit(SCROLL_PAGE);
                if let Some(ref off) = offset {
                    builder = builder.offset(off.clone());
                }

                let response = self
                    .client
                    .scroll(builder)
                    .await
                    .map_err(|e| IndexError::Scroll(e.to_string()))?;

                for point in &response.result {
                    let Some(id_val) = point.payload.get(RECORD_ID_KEY) else {
                        continue;
                    };
                    let Some(Kind::StringValue(id)) = &id_val.kind else {
                        continue;
                    };
                    ids.push(id.clone());
                }

                match response.next_page_offset {
                    Some(next) => offset = Some(next),
                    None => break,
                }
            }

            Ok(ids)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_url() {
        assert!(QdrantIndex::new("http://localhost:6334", "chunks").is_ok());
    }

    #[test]
    fn new_invalid_url() {
        assert!(QdrantIndex::new("not a valid url", "chunks").is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_open() {
        let index = QdrantIndex::new("http://localhost:6334", "chunks").unwrap();
        let err = index.count(None).await.unwrap_err();
        assert!(matches!(err, IndexError::NotOpened));
        let err = index.delete(vec!["a".into()]).await.unwrap_err();
        assert!(matches!(err, IndexError::NotOpened));
    }

    #[test]
    fn point_uuid_is_deterministic() {
        assert_eq!(point_uuid("doc1_chunk_0"), point_uuid("doc1_chunk_0"));
        assert_ne!(point_uuid("doc1_chunk_0"), point_uuid("doc1_chunk_1"));
    }

    #[test]
    fn debug_format() {
        let index = QdrantIndex::new("http://localhost:6334", "chunks").unwrap();
        let dbg = format!("{index:?}");
        assert!(dbg.contains("QdrantIndex"));
        assert!(dbg.contains("chunks"));
    }
}
