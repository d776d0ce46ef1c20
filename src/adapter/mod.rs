//! Collaborator seams the middleware consumes
//!
//! The core wraps an external tokenizer and embedding source behind
//! traits; concrete bindings implement them once, keeping runtime
//! shape-probing out of the analysis code.

mod chunk;
mod embedding;
mod heuristic;
mod tokenizer;
pub mod vector;

pub use chunk::{ChunkToken, RetrievedChunk};
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use heuristic::{HeuristicProvider, HeuristicTokenizer};
pub use tokenizer::{TokenizerAdapter, TokenizerError, TokenizerProvider};
