//! Common test utilities for integration tests
//!
//! Provides a scripted tokenizer with a fixed word table, a provider
//! that can hand out vocabulary-less adapters, a deterministic
//! embedder, and chunk builders.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokenscope::{
    ChunkToken, EmbeddingError, EmbeddingProvider, RetrievedChunk, TokenizerAdapter,
    TokenizerError, TokenizerProvider,
};

/// Deterministic whitespace tokenizer over a fixed word table.
///
/// Words outside the table become `<unk>` (id 0). When constructed
/// opaque, the vocabulary map is withheld so the engine exercises its
/// degraded confidence rules.
pub struct ScriptedTokenizer {
    name: String,
    vocab: Arc<HashMap<String, u32>>,
    expose_vocab: bool,
}

impl ScriptedTokenizer {
    pub fn new(name: &str) -> Self {
        let words = [
            "hello", "world", "query", "token", "data", "model", "search", "the", "a",
        ];
        let mut vocab = HashMap::new();
        vocab.insert("<unk>".to_string(), 0);
        for (i, word) in words.iter().enumerate() {
            vocab.insert((*word).to_string(), i as u32 + 1);
        }
        Self {
            name: name.to_string(),
            vocab: Arc::new(vocab),
            expose_vocab: true,
        }
    }

    /// Same table, but `vocabulary()` returns an empty map.
    pub fn opaque(name: &str) -> Self {
        Self {
            expose_vocab: false,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl TokenizerAdapter for ScriptedTokenizer {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        Ok(text
            .split_whitespace()
            .map(|word| self.vocab.get(word).copied().unwrap_or(0))
            .collect())
    }

    async fn decode_batch(&self, ids: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        ids.iter()
            .map(|group| {
                let words: Vec<&str> = group
                    .iter()
                    .map(|id| {
                        self.vocab
                            .iter()
                            .find(|(_, v)| *v == id)
                            .map(|(k, _)| k.as_str())
                            .unwrap_or("<unk>")
                    })
                    .collect();
                Ok(words.join(" "))
            })
            .collect()
    }

    fn vocabulary(&self) -> Arc<HashMap<String, u32>> {
        if self.expose_vocab {
            Arc::clone(&self.vocab)
        } else {
            Arc::new(HashMap::new())
        }
    }
}

/// Provider for scripted adapters. Model names ending in `-opaque`
/// withhold the vocabulary.
pub struct ScriptedProvider;

#[async_trait]
impl TokenizerProvider for ScriptedProvider {
    async fn load(&self, model: &str) -> Result<Arc<dyn TokenizerAdapter>, TokenizerError> {
        if model.is_empty() {
            return Err(TokenizerError::LoadFailed {
                model: model.to_string(),
                reason: "empty model name".to_string(),
            });
        }
        if model.ends_with("-opaque") {
            Ok(Arc::new(ScriptedTokenizer::opaque(model)))
        } else {
            Ok(Arc::new(ScriptedTokenizer::new(model)))
        }
    }
}

/// Embedder returning the same unit-ish vector for every query.
pub struct StaticEmbedder {
    pub vector: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            vector: (0..dim).map(|i| ((i as f32) * 0.3).sin()).collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector.clone())
    }
}

/// Build a chunk whose tokens are its whitespace words.
pub fn chunk(id: &str, content: &str, similarity: f64) -> RetrievedChunk {
    RetrievedChunk {
        chunk_id: id.to_string(),
        content: content.to_string(),
        tokens: content
            .split_whitespace()
            .enumerate()
            .map(|(position, token)| ChunkToken {
                token: token.to_string(),
                token_id: position as u32 + 1,
                position,
            })
            .collect(),
        overall_similarity: similarity,
    }
}
