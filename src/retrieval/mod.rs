//! Retrieval alignment mapping
//!
//! Explains which tokens of a query actually drove a retrieval result:
//! per-token contribution attribution, a query-token x chunk-token
//! similarity matrix, key match paths and a quality verdict.

mod strategy;

pub use strategy::{EstimatedEmbeddingStrategy, TokenEmbeddingStrategy};

use crate::adapter::vector::{cosine_similarity, edit_distance, l2_norm};
use crate::adapter::RetrievedChunk;
use crate::token::TokenDecisionMetadata;
use serde::{Deserialize, Serialize};

/// Similarity entries below this are dropped from the matrix.
const MATRIX_FLOOR: f64 = 0.3;
/// Matrix entries above this count as strong matches.
const STRONG_MATCH: f64 = 0.7;
const MATRIX_LIMIT: usize = 100;
const PATH_LIMIT: usize = 20;

/// Attribution of the retrieval result to one query token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalContribution {
    pub token: String,
    pub token_id: u32,
    /// cosine similarity x vector norm
    pub contribution: f64,
    /// contribution / sum of absolute contributions
    pub normalized_contribution: f64,
    pub cosine_similarity: f64,
    pub vector_norm: f64,
    /// contribution > 1.5x the mean
    pub is_key_token: bool,
}

/// One cell of the query-token x chunk-token similarity matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityEntry {
    pub query_index: usize,
    pub query_token: String,
    pub chunk_id: String,
    pub chunk_position: usize,
    pub chunk_token: String,
    pub similarity: f64,
}

/// Verdict on how well key tokens were matched by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalQuality {
    /// Fraction of key tokens appearing in at least one key match path
    pub key_token_coverage: f64,
    /// Mean similarity of key match paths
    pub avg_match_strength: f64,
    /// 0.5 x coverage + 0.5 x strength
    pub quality_score: f64,
    /// Plain-text advisories, never fatal
    pub issues: Vec<String>,
}

/// Full retrieval-alignment output for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalAlignment {
    pub contributions: Vec<RetrievalContribution>,
    pub similarity_matrix: Vec<SimilarityEntry>,
    pub key_paths: Vec<SimilarityEntry>,
    pub quality: RetrievalQuality,
    /// Which token-embedding strategy produced the vectors
    pub embedding_strategy: String,
}

/// Maps query tokens onto retrieval evidence.
pub struct RetrievalAlignmentMapper {
    strategy: Box<dyn TokenEmbeddingStrategy>,
}

impl Default for RetrievalAlignmentMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrievalAlignmentMapper {
    /// Mapper with the estimated pseudo-embedding strategy.
    pub fn new() -> Self {
        Self {
            strategy: Box::new(EstimatedEmbeddingStrategy::new()),
        }
    }

    /// Mapper with a caller-supplied embedding strategy.
    pub fn with_strategy(strategy: Box<dyn TokenEmbeddingStrategy>) -> Self {
        Self { strategy }
    }

    /// Run the full alignment pass.
    pub fn analyze(
        &self,
        tokens: &[TokenDecisionMetadata],
        query_embedding: &[f32],
        token_embeddings: Option<&[Vec<f32>]>,
        chunks: &[RetrievedChunk],
    ) -> RetrievalAlignment {
        let mut contributions =
            self.calculate_retrieval_contributions(tokens, query_embedding, token_embeddings);
        self.normalize_and_mark_key_tokens(&mut contributions);
        let similarity_matrix = self.build_similarity_matrix(tokens, chunks);
        let key_paths = self.identify_key_match_paths(&contributions, &similarity_matrix);
        let quality = self.analyze_retrieval_quality(&contributions, &key_paths);

        RetrievalAlignment {
            contributions,
            similarity_matrix,
            key_paths,
            quality,
            embedding_strategy: self.strategy.name().to_string(),
        }
    }

    /// Per-token contribution: cosine to the query times vector norm.
    ///
    /// Uses a supplied per-token embedding when one is given for the
    /// index; otherwise falls back to the configured strategy.
    pub fn calculate_retrieval_contributions(
        &self,
        tokens: &[TokenDecisionMetadata],
        query_embedding: &[f32],
        token_embeddings: Option<&[Vec<f32>]>,
    ) -> Vec<RetrievalContribution> {
        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let supplied = token_embeddings
                    .and_then(|e| e.get(i))
                    .filter(|v| !v.is_empty());
                let vector = match supplied {
                    Some(v) => v.clone(),
                    None => self.strategy.token_embedding(token, query_embedding),
                };
                let cosine = cosine_similarity(&vector, query_embedding);
                let norm = l2_norm(&vector);
                RetrievalContribution {
                    token: token.byte_range.original_text.clone(),
                    token_id: token.token_id,
                    contribution: cosine * norm,
                    normalized_contribution: 0.0,
                    cosine_similarity: cosine,
                    vector_norm: norm,
                    is_key_token: false,
                }
            })
            .collect()
    }

    /// Normalize contributions to sum to 1 by absolute value and mark
    /// key tokens (contribution above 1.5x the mean).
    pub fn normalize_and_mark_key_tokens(&self, contributions: &mut [RetrievalContribution]) {
        if contributions.is_empty() {
            return;
        }
        let total: f64 = contributions.iter().map(|c| c.contribution.abs()).sum();
        let mean: f64 =
            contributions.iter().map(|c| c.contribution).sum::<f64>() / contributions.len() as f64;
        for c in contributions.iter_mut() {
            c.normalized_contribution = if total > 0.0 {
                c.contribution / total
            } else {
                0.0
            };
            c.is_key_token = c.contribution > 1.5 * mean;
        }
    }

    /// Score every (query token, chunk token) pair, keep entries above
    /// the floor, strongest first, capped at 100.
    pub fn build_similarity_matrix(
        &self,
        tokens: &[TokenDecisionMetadata],
        chunks: &[RetrievedChunk],
    ) -> Vec<SimilarityEntry> {
        let mut entries = Vec::new();
        for (qi, token) in tokens.iter().enumerate() {
            let query_text = strip_markers(&token.byte_range.original_text);
            for chunk in chunks {
                for chunk_token in &chunk.tokens {
                    let chunk_text = strip_markers(&chunk_token.token);
                    let similarity = token_similarity(
                        &query_text,
                        token.token_id,
                        &chunk_text,
                        chunk_token.token_id,
                    );
                    if similarity > MATRIX_FLOOR {
                        entries.push(SimilarityEntry {
                            query_index: qi,
                            query_token: query_text.clone(),
                            chunk_id: chunk.chunk_id.clone(),
                            chunk_position: chunk_token.position,
                            chunk_token: chunk_text,
                            similarity,
                        });
                    }
                }
            }
        }
        entries.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(MATRIX_LIMIT);
        entries
    }

    /// Strong matches (similarity > 0.7) on key tokens, capped at 20.
    pub fn identify_key_match_paths(
        &self,
        contributions: &[RetrievalContribution],
        matrix: &[SimilarityEntry],
    ) -> Vec<SimilarityEntry> {
        let mut paths: Vec<SimilarityEntry> = matrix
            .iter()
            .filter(|entry| {
                contributions
                    .get(entry.query_index)
                    .is_some_and(|c| c.is_key_token)
                    && entry.similarity > STRONG_MATCH
            })
            .cloned()
            .collect();
        paths.truncate(PATH_LIMIT);
        paths
    }

    /// Quality verdict over key tokens and their match paths.
    pub fn analyze_retrieval_quality(
        &self,
        contributions: &[RetrievalContribution],
        paths: &[SimilarityEntry],
    ) -> RetrievalQuality {
        let key_indices: Vec<usize> = contributions
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_key_token)
            .map(|(i, _)| i)
            .collect();

        let covered = key_indices
            .iter()
            .filter(|i| paths.iter().any(|p| p.query_index == **i))
            .count();
        let key_token_coverage = if key_indices.is_empty() {
            0.0
        } else {
            covered as f64 / key_indices.len() as f64
        };
        let avg_match_strength = if paths.is_empty() {
            0.0
        } else {
            paths.iter().map(|p| p.similarity).sum::<f64>() / paths.len() as f64
        };
        let quality_score = 0.5 * key_token_coverage + 0.5 * avg_match_strength;

        let mut issues = Vec::new();
        if key_token_coverage < 0.5 {
            issues.push(format!(
                "only {:.0}% of key tokens matched retrieved content",
                key_token_coverage * 100.0
            ));
        }
        if avg_match_strength < 0.6 {
            issues.push(format!(
                "weak average match strength {avg_match_strength:.2}; retrieved chunks may be tangential"
            ));
        }

        RetrievalQuality {
            key_token_coverage,
            avg_match_strength,
            quality_score,
            issues,
        }
    }
}

fn strip_markers(token: &str) -> String {
    for prefix in ["##", "\u{2581}", "\u{120}"] {
        if let Some(stripped) = token.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    token.to_string()
}

/// Similarity of two tokens: exact match, containment, or a blend of
/// edit distance and id proximity.
fn token_similarity(a: &str, a_id: u32, b: &str, b_id: u32) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let (a_len, b_len) = (a.chars().count(), b.chars().count());
    if a.contains(b) || b.contains(a) {
        return 0.8 * a_len.min(b_len) as f64 / a_len.max(b_len) as f64;
    }
    let distance = edit_distance(a, b);
    let normalized = distance as f64 / a_len.max(b_len) as f64;
    let id_proximity = 1.0 - f64::from(a_id.abs_diff(b_id)) / f64::from(a_id.max(b_id).max(1));
    0.7 * (1.0 - normalized) + 0.3 * id_proximity.clamp(0.0, 1.0)
}
