//! Tokenizer adapter contract
//!
//! A binding implements `TokenizerAdapter` once per tokenizer library;
//! the capture engine only needs encode, decode and a vocabulary view.
//! A `TokenizerProvider` loads adapters by model name.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from tokenizer bindings.
///
/// Only `LoadFailed` is fatal to the pipeline; encode/decode errors on an
/// initialized adapter are surfaced but a single bad token never aborts a
/// trace.
#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("failed to load tokenizer '{model}': {reason}")]
    LoadFailed { model: String, reason: String },

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("encode failed: {0}")]
    EncodeFailed(String),

    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// The contract tokenizer bindings implement.
///
/// `vocabulary()` replaces runtime shape-probing of binding internals:
/// the adapter resolves its own internal vocabulary representation into a
/// plain token -> id map. An empty map is a valid degraded state — the
/// engine falls back to numeric-id confidence rules and coverage scores
/// degrade instead of the call failing.
#[async_trait]
pub trait TokenizerAdapter: Send + Sync {
    /// Name of the loaded model
    fn model_name(&self) -> &str;

    /// Encode text into token ids
    async fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;

    /// Decode each id group into its text
    async fn decode_batch(&self, ids: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError>;

    /// Token -> id vocabulary view; empty when the binding exposes none
    fn vocabulary(&self) -> Arc<HashMap<String, u32>>;
}

/// Loads tokenizer adapters by model name.
#[async_trait]
pub trait TokenizerProvider: Send + Sync {
    /// Load (or construct) an adapter for the named model.
    ///
    /// # Errors
    ///
    /// Returns `TokenizerError::LoadFailed` or `UnknownModel` when the
    /// model cannot be loaded. This is the only error class that
    /// propagates out of the analysis pipeline.
    async fn load(&self, model: &str) -> Result<Arc<dyn TokenizerAdapter>, TokenizerError>;
}
