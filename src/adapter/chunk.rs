//! Retrieved-chunk input types
//!
//! Chunks arrive already retrieved; this core never queries a vector
//! store itself.

use serde::{Deserialize, Serialize};

/// One token of a retrieved chunk, as reported by the retrieval layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkToken {
    pub token: String,
    pub token_id: u32,
    /// Index of the token within the chunk
    pub position: usize,
}

/// A chunk returned by vector search, with its token breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub tokens: Vec<ChunkToken>,
    /// Similarity the vector store reported for the whole chunk
    pub overall_similarity: f64,
}
