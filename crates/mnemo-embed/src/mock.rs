//! Test-only mock embedder.

use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;

use crate::embedder::Embedder;
use crate::error::EmbedError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Deterministic hash-bucket embeddings: each whitespace token increments
/// one dimension, and the vector is L2-normalized. Identical texts map to
/// identical vectors; texts sharing tokens land closer than unrelated ones.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub fail: bool,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 384,
            fail: false,
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for token in text.split_whitespace() {
            let mut hasher = std::hash::DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = usize::try_from(hasher.finish()).unwrap_or(usize::MAX) % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>, EmbedError>> {
        Box::pin(async move {
            if self.fail {
                return Err(EmbedError::Inference("mock embedding failure".into()));
            }
            Ok(texts.iter().map(|t| self.embed_one(t)).collect())
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_per_text() {
        let embedder = MockEmbedder::with_dimension(16);
        let a = embedder.embed(vec!["photosynthesis in plants".into()]).await.unwrap();
        let b = embedder.embed(vec!["photosynthesis in plants".into()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn one_vector_per_input_in_order() {
        let embedder = MockEmbedder::with_dimension(8);
        let vectors = embedder
            .embed(vec!["alpha".into(), "beta".into(), "alpha".into()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        assert!(vectors.iter().all(|v| v.len() == 8));
    }

    #[tokio::test]
    async fn failure_mode() {
        let embedder = MockEmbedder::failing();
        assert!(embedder.embed(vec!["anything".into()]).await.is_err());
    }

    #[tokio::test]
    async fn vectors_are_normalized() {
        let embedder = MockEmbedder::with_dimension(8);
        let vectors = embedder.embed(vec!["a b c d".into()]).await.unwrap();
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
