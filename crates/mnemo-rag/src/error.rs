use mnemo_embed::EmbedError;
use mnemo_index::IndexError;

#[derive(Debug, thiserror::Error)]
pub enum ChunkerConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap {overlap} must be smaller than chunk_size {chunk_size}")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("chunker configuration: {0}")]
    Chunker(#[from] ChunkerConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
