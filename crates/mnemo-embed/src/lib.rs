//! Text embedding backends: batched sentence embeddings behind an
//! object-safe [`Embedder`] trait, with lazy single-flight model loading.

#[cfg(feature = "candle")]
pub mod candle;
pub mod embedder;
pub mod error;
pub mod lazy;
#[cfg(feature = "mock")]
pub mod mock;

pub use embedder::Embedder;
pub use error::EmbedError;
pub use lazy::LazyEmbedder;
