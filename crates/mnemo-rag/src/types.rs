use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payload key holding the chunk text alongside its metadata.
pub(crate) const TEXT_KEY: &str = "text";

/// Identity of a document being ingested. The document record itself lives
/// in the caller's registry; chunks only reference it.
#[derive(Debug, Clone)]
pub struct DocumentDescriptor {
    pub document_id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
}

/// Per-chunk metadata stored in the index payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
    pub chunk_index: usize,
}

impl ChunkMetadata {
    /// Serialize into an index payload, with the chunk text under
    /// [`TEXT_KEY`].
    ///
    /// # Errors
    ///
    /// Returns an error if metadata serialization fails.
    pub(crate) fn into_payload(
        self,
        text: &str,
    ) -> Result<HashMap<String, serde_json::Value>, serde_json::Error> {
        let serde_json::Value::Object(fields) = serde_json::to_value(self)? else {
            unreachable!("struct serializes to a JSON object");
        };
        let mut payload: HashMap<String, serde_json::Value> = fields.into_iter().collect();
        payload.insert(TEXT_KEY.into(), serde_json::Value::String(text.to_owned()));
        Ok(payload)
    }
}

/// One retrieval hit, best match first in [`RetrievedContext::sources`].
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub content: String,
    pub filename: String,
    pub document_id: String,
    /// Cosine similarity in `[0, 1]`-ish range: `1 - distance`.
    pub score: f32,
}

/// Retrieval result: raw context strings plus their attributed sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    pub contexts: Vec<String>,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub total_entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_contains_metadata_and_text() {
        let metadata = ChunkMetadata {
            document_id: "doc1".into(),
            user_id: "u1".into(),
            filename: "notes.pdf".into(),
            file_type: "pdf".into(),
            chunk_index: 3,
        };
        let payload = metadata.into_payload("chunk body").unwrap();
        assert_eq!(payload.get("document_id").unwrap(), "doc1");
        assert_eq!(payload.get("user_id").unwrap(), "u1");
        assert_eq!(payload.get("filename").unwrap(), "notes.pdf");
        assert_eq!(payload.get("file_type").unwrap(), "pdf");
        assert_eq!(payload.get("chunk_index").unwrap(), 3);
        assert_eq!(payload.get(TEXT_KEY).unwrap(), "chunk body");
    }
}
