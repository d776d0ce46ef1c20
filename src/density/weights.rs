//! Embedding weight statistics
//!
//! Static statistics of a raw vector plus query-relative importance.

use crate::adapter::vector::{cosine_similarity, l1_norm, l2_norm};
use serde::{Deserialize, Serialize};

/// Components with |x| below this count as zero for sparsity.
const SPARSITY_EPSILON: f32 = 0.01;

/// Query-independent statistics of one vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticWeight {
    pub l2_norm: f64,
    pub l1_norm: f64,
    pub max_abs_value: f64,
    pub mean: f64,
    pub variance: f64,
    /// Fraction of near-zero components
    pub sparsity: f64,
}

/// Query-relative importance of one vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicImportance {
    /// |cosine to query|, or a neutral 0.5 without a query
    pub context_relevance: f64,
    pub query_cosine_similarity: Option<f64>,
    /// cosine x norm, or a neutral 0.5 without a query
    pub semantic_contribution: f64,
}

/// Static + dynamic weight statistics for one embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingMapping {
    pub static_weight: StaticWeight,
    pub dynamic_importance: DynamicImportance,
}

/// Compute weight statistics for `vector`, optionally relative to a
/// query vector.
pub(crate) fn calculate(vector: &[f32], query: Option<&[f32]>) -> EmbeddingMapping {
    let n = vector.len();
    let (mean, variance, max_abs, near_zero) = if n > 0 {
        let mean = vector.iter().map(|x| f64::from(*x)).sum::<f64>() / n as f64;
        let variance = vector
            .iter()
            .map(|x| (f64::from(*x) - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let max_abs = vector.iter().map(|x| f64::from(x.abs())).fold(0.0, f64::max);
        let near_zero = vector.iter().filter(|x| x.abs() < SPARSITY_EPSILON).count();
        (mean, variance, max_abs, near_zero)
    } else {
        (0.0, 0.0, 0.0, 0)
    };

    let static_weight = StaticWeight {
        l2_norm: l2_norm(vector),
        l1_norm: l1_norm(vector),
        max_abs_value: max_abs,
        mean,
        variance,
        sparsity: if n > 0 { near_zero as f64 / n as f64 } else { 0.0 },
    };

    let dynamic_importance = match query {
        Some(query) => {
            let cosine = cosine_similarity(vector, query);
            DynamicImportance {
                context_relevance: cosine.abs(),
                query_cosine_similarity: Some(cosine),
                semantic_contribution: cosine * static_weight.l2_norm,
            }
        }
        None => DynamicImportance {
            context_relevance: 0.5,
            query_cosine_similarity: None,
            semantic_contribution: 0.5,
        },
    };

    EmbeddingMapping {
        static_weight,
        dynamic_importance,
    }
}
