use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::embedder::Embedder;
use crate::error::EmbedError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Defers model loading to the first `embed` call.
///
/// The loader runs on the blocking pool and is memoized for the process
/// lifetime; concurrent first callers trigger exactly one load. A failed
/// load leaves the cell empty, so the next call invokes the loader again
/// (any retry policy belongs to the caller).
pub struct LazyEmbedder<E> {
    cell: OnceCell<Arc<E>>,
    init: Arc<dyn Fn() -> Result<E, EmbedError> + Send + Sync>,
}

impl<E> std::fmt::Debug for LazyEmbedder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEmbedder")
            .field("loaded", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}

impl<E> LazyEmbedder<E>
where
    E: Embedder + Send + Sync + 'static,
{
    pub fn new(init: impl Fn() -> Result<E, EmbedError> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceCell::new(),
            init: Arc::new(init),
        }
    }

    /// Whether the underlying model has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    async fn inner(&self) -> Result<&Arc<E>, EmbedError> {
        self.cell
            .get_or_try_init(|| {
                let init = Arc::clone(&self.init);
                async move {
                    tracing::debug!("loading embedding model on first use");
                    tokio::task::spawn_blocking(move || init().map(Arc::new))
                        .await
                        .map_err(|e| EmbedError::ModelLoad(format!("loader task failed: {e}")))?
                }
            })
            .await
    }
}

impl<E> Embedder for LazyEmbedder<E>
where
    E: Embedder + Send + Sync + 'static,
{
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>, EmbedError>> {
        Box::pin(async move {
            let inner = self.inner().await?;
            inner.embed(texts).await
        })
    }

    fn name(&self) -> &'static str {
        "lazy"
    }
}
