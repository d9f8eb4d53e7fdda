use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rag: RagConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    /// Default number of results returned by a retrieval.
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub qdrant_url: String,
    pub collection: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// HuggingFace repository of the sentence-embedding model.
    pub model: String,
    /// Output dimension of the model above.
    pub dimension: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            top_k: 5,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".into(),
            collection: "study_documents".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".into(),
            dimension: 384,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rag: RagConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MNEMO_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("MNEMO_COLLECTION") {
            self.index.collection = v;
        }
        if let Ok(v) = std::env::var("MNEMO_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("MNEMO_CHUNK_SIZE")
            && let Ok(n) = v.parse()
        {
            self.rag.chunk_size = n;
        }
        if let Ok(v) = std::env::var("MNEMO_CHUNK_OVERLAP")
            && let Ok(n) = v.parse()
        {
            self.rag.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("MNEMO_TOP_K")
            && let Ok(n) = v.parse()
        {
            self.rag.top_k = n;
        }
    }
}
