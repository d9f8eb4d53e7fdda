use std::future::Future;
use std::pin::Pin;

use crate::error::EmbedError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Batched text embedding.
///
/// One vector is returned per input string, in input order, all with the
/// fixed dimensionality of the underlying model. Inference may block for
/// tens to hundreds of milliseconds, so implementations dispatch it off the
/// async scheduler; callers simply await.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>, EmbedError>>;

    fn name(&self) -> &'static str;
}
