use mnemo_embed::{EmbedError, Embedder};
use mnemo_index::{FieldValue, IndexFilter, VectorIndex, VectorRecord};

use crate::chunker::RecursiveSplitter;
use crate::error::RagError;
use crate::types::{
    ChunkMetadata, DocumentDescriptor, IndexStats, RetrievedContext, Source, TEXT_KEY,
};

/// Deterministic chunk id: the same document and position always map to the
/// same index entry, so re-ingestion overwrites instead of accumulating.
#[must_use]
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{document_id}_chunk_{index}")
}

/// Orchestrates chunking, embedding, and the vector index.
///
/// All tenant isolation happens here: every retrieval is scoped by a
/// `user_id` filter evaluated inside the index, never by post-filtering a
/// cross-tenant result set.
pub struct RagEngine<E, S> {
    embedder: E,
    index: S,
    splitter: RecursiveSplitter,
    top_k: usize,
}

impl<E, S> std::fmt::Debug for RagEngine<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl<E, S> RagEngine<E, S>
where
    E: Embedder,
    S: VectorIndex,
{
    pub fn new(embedder: E, index: S, splitter: RecursiveSplitter, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            splitter,
            top_k,
        }
    }

    /// Access the underlying index, e.g. for stats beyond [`Self::index_stats`].
    pub fn index(&self) -> &S {
        &self.index
    }

    /// Chunk, embed, and index one document. Returns the chunk count.
    ///
    /// Effectively-empty text indexes nothing and returns 0. Chunks from a
    /// previous ingestion of the same `document_id` are deleted before the
    /// new set is written, so a shrinking document leaves no stale trailing
    /// chunks behind. Embedding runs before any index write; an embedding
    /// failure therefore leaves the index untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or any index operation fails. A
    /// failure mid-upsert may leave a partial chunk set; there is no
    /// cross-call rollback.
    pub async fn ingest_document(
        &self,
        text: &str,
        doc: &DocumentDescriptor,
    ) -> Result<usize, RagError> {
        let chunks = self.splitter.split(text);
        if chunks.is_empty() {
            tracing::debug!(document_id = %doc.document_id, "nothing to ingest");
            return Ok(0);
        }

        let vectors = self.embedder.embed(chunks.clone()).await?;

        self.delete_document_chunks(&doc.document_id).await?;

        let mut records = Vec::with_capacity(chunks.len());
        for (index, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            let metadata = ChunkMetadata {
                document_id: doc.document_id.clone(),
                user_id: doc.user_id.clone(),
                filename: doc.filename.clone(),
                file_type: doc.file_type.clone(),
                chunk_index: index,
            };
            records.push(VectorRecord {
                id: chunk_id(&doc.document_id, index),
                vector,
                payload: metadata.into_payload(chunk)?,
            });
        }

        self.index.upsert(records).await?;
        tracing::debug!(
            document_id = %doc.document_id,
            user_id = %doc.user_id,
            chunks = chunks.len(),
            "document ingested"
        );
        Ok(chunks.len())
    }

    /// Retrieve the chunks most relevant to `query` for one tenant.
    ///
    /// Results never cross tenants: the `user_id` filter participates in
    /// the search itself, and fewer than `top_k` matches simply yield a
    /// shorter list. An optional `document_ids` set narrows the search
    /// further. No matches is an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if query embedding or the index search fails.
    pub async fn retrieve_context(
        &self,
        query: &str,
        user_id: &str,
        top_k: Option<usize>,
        document_ids: Option<&[String]>,
    ) -> Result<RetrievedContext, RagError> {
        let limit = top_k.unwrap_or(self.top_k);

        let vectors = self.embedder.embed(vec![query.to_owned()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            RagError::Embedding(EmbedError::Inference(
                "embedder returned no vector for query".into(),
            ))
        })?;

        let mut filter = IndexFilter::matching("user_id", FieldValue::Text(user_id.to_owned()));
        if let Some(ids) = document_ids
            && !ids.is_empty()
        {
            filter = filter.and("document_id", FieldValue::AnyOf(ids.to_vec()));
        }

        let hits = self.index.query(vector, limit, Some(filter)).await?;

        let mut contexts = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());
        for hit in hits {
            let content = hit
                .payload
                .get(TEXT_KEY)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
            let filename = hit
                .payload
                .get("filename")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
                .to_owned();
            let document_id = hit
                .payload
                .get("document_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();

            contexts.push(content.clone());
            sources.push(Source {
                content,
                filename,
                document_id,
                score: 1.0 - hit.distance,
            });
        }

        tracing::debug!(user_id, hits = sources.len(), "context retrieved");
        Ok(RetrievedContext { contexts, sources })
    }

    /// Delete every chunk belonging to `document_id`, across all of its
    /// ingestions. A document with no chunks is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the id lookup or deletion fails.
    pub async fn delete_document_chunks(&self, document_id: &str) -> Result<(), RagError> {
        let filter = IndexFilter::matching("document_id", FieldValue::Text(document_id.to_owned()));
        let ids = self.index.list_ids(filter).await?;
        if ids.is_empty() {
            return Ok(());
        }
        let removed = ids.len();
        self.index.delete(ids).await?;
        tracing::debug!(document_id, removed, "document chunks deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the index count fails.
    pub async fn index_stats(&self) -> Result<IndexStats, RagError> {
        Ok(IndexStats {
            total_entries: self.index.count(None).await?,
        })
    }
}
