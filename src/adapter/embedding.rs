//! Embedding provider contract

use async_trait::async_trait;
use thiserror::Error;

/// Error type for embedding operations.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("embedding returned no results")]
    EmptyResult,

    #[error("embedding model error: {0}")]
    ModelError(String),
}

/// Trait for embedding query text into vectors.
///
/// Only consumed when retrieval-contribution analysis is requested and
/// the caller did not supply a precomputed query embedding.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a query string into a single vector.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
