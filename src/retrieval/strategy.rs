//! Token embedding strategies
//!
//! Real per-token embeddings are rarely available at analysis time, so
//! the default strategy estimates one. The estimate is directionally
//! blended toward the query vector but is NOT a faithful token vector;
//! it exists to make contribution attribution computable, and callers
//! with real vectors should pass them instead.

use crate::token::TokenDecisionMetadata;

/// Produces a vector for one query token, given the query embedding.
pub trait TokenEmbeddingStrategy: Send + Sync {
    /// Strategy name, recorded for provenance.
    fn name(&self) -> &str;

    /// Vector for `token`, same dimension as `query_embedding`.
    fn token_embedding(&self, token: &TokenDecisionMetadata, query_embedding: &[f32]) -> Vec<f32>;
}

/// Deterministic sinusoidal pseudo-embedding, blended toward the query
/// proportionally to the token's confidence.
///
/// A token the engine is certain about is assumed to point where the
/// query points; an uncertain token keeps more of its synthetic
/// direction. Swap in a real per-token-embedding strategy where a
/// binding can supply one.
#[derive(Debug, Clone, Default)]
pub struct EstimatedEmbeddingStrategy;

impl EstimatedEmbeddingStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl TokenEmbeddingStrategy for EstimatedEmbeddingStrategy {
    fn name(&self) -> &str {
        "estimated-sinusoidal"
    }

    fn token_embedding(&self, token: &TokenDecisionMetadata, query_embedding: &[f32]) -> Vec<f32> {
        let id = f64::from(token.token_id);
        let confidence = token.confidence as f32;
        query_embedding
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let base = (id * 0.1 + i as f64 * 0.7).sin() as f32;
                (1.0 - confidence) * base + confidence * q
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{ByteRange, DecisionType, PathLogic, SemanticEntropy};

    fn token_with_confidence(confidence: f64) -> TokenDecisionMetadata {
        TokenDecisionMetadata {
            token_id: 7,
            token: "test".to_string(),
            path_logic: PathLogic::default(),
            semantic_entropy: SemanticEntropy::default(),
            byte_range: ByteRange::new(0, "test"),
            decision_type: DecisionType::Direct,
            confidence,
        }
    }

    #[test]
    fn full_confidence_reproduces_query() {
        let query = vec![0.3f32, -0.5, 0.9];
        let strategy = EstimatedEmbeddingStrategy::new();
        let v = strategy.token_embedding(&token_with_confidence(1.0), &query);
        for (a, b) in v.iter().zip(query.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn output_is_deterministic() {
        let query = vec![0.1f32; 8];
        let strategy = EstimatedEmbeddingStrategy::new();
        let token = token_with_confidence(0.5);
        assert_eq!(
            strategy.token_embedding(&token, &query),
            strategy.token_embedding(&token, &query)
        );
    }

    #[test]
    fn dimension_matches_query() {
        let strategy = EstimatedEmbeddingStrategy::new();
        let v = strategy.token_embedding(&token_with_confidence(0.2), &[0.0; 17]);
        assert_eq!(v.len(), 17);
    }
}
