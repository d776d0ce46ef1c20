//! Density and entropy statistics over captured tokens
//!
//! Pure synchronous math: the calculator consumes token metadata and
//! produces per-token density scores, aggregate statistics and a
//! run-length heatmap segmentation.

mod coverage;
mod weights;

pub use coverage::{CoverageLevel, DomainRecognition, KnowledgeCoverage};
pub use weights::{DynamicImportance, EmbeddingMapping, StaticWeight};

use crate::token::TokenDecisionMetadata;
use serde::{Deserialize, Serialize};

/// Heat bucket for a token or region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatBucket {
    Hot,
    Warm,
    Neutral,
    Cold,
}

impl HeatBucket {
    /// Bucket thresholds: hot >= 0.75, warm >= 0.5, neutral >= 0.25.
    pub fn from_heat(heat: f64) -> Self {
        if heat >= 0.75 {
            HeatBucket::Hot
        } else if heat >= 0.5 {
            HeatBucket::Warm
        } else if heat >= 0.25 {
            HeatBucket::Neutral
        } else {
            HeatBucket::Cold
        }
    }
}

/// Per-token density scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDensity {
    pub token: String,
    /// Characters carried per token slot
    pub char_density: f64,
    /// Bytes carried per token slot
    pub byte_density: f64,
    /// Entropy bits per source byte
    pub information_density: f64,
    /// 1 - 1/byte_length; how much the token compresses its span
    pub compression_efficiency: f64,
    /// Weighted blend of the three densities, in [0, 1]
    pub heat_value: f64,
    pub is_high_density: bool,
    pub is_low_density: bool,
}

/// Aggregate statistics across all tokens of a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityStats {
    pub mean_char_density: f64,
    pub max_char_density: f64,
    pub min_char_density: f64,
    pub variance_char_density: f64,
    /// Sum of entropy contributions (bits)
    pub total_entropy: f64,
    /// Input character count / token count
    pub compression_ratio: f64,
    /// Fraction of low-density tokens
    pub fragmentation_index: f64,
}

/// A maximal run of consecutive tokens sharing one heat bucket.
///
/// Regions partition the token index space: `start_index..=end_index`,
/// in order, no gaps, no overlaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapRegion {
    pub start_index: usize,
    pub end_index: usize,
    pub bucket: HeatBucket,
    pub mean_heat: f64,
}

/// Everything the density pass produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityResult {
    pub tokens: Vec<TokenDensity>,
    pub stats: DensityStats,
    pub regions: Vec<HeatmapRegion>,
}

/// Turns token metadata into density, coverage and weight statistics.
#[derive(Debug, Clone, Default)]
pub struct DensityCalculator;

impl DensityCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute per-token densities, aggregate stats and heatmap regions.
    pub fn calculate(&self, text: &str, tokens: &[TokenDecisionMetadata]) -> DensityResult {
        let token_densities: Vec<TokenDensity> =
            tokens.iter().map(Self::token_density).collect();

        let stats = Self::aggregate(text, tokens, &token_densities);
        let regions = Self::heatmap_regions(&token_densities);

        DensityResult {
            tokens: token_densities,
            stats,
            regions,
        }
    }

    /// Score how well the model's vocabulary covered the text.
    pub fn calculate_knowledge_coverage(
        &self,
        text: &str,
        tokens: &[TokenDecisionMetadata],
    ) -> KnowledgeCoverage {
        coverage::calculate(text, tokens)
    }

    /// Weight statistics for one embedding vector, optionally relative
    /// to a query vector.
    pub fn calculate_embedding_weights(
        &self,
        vector: &[f32],
        query: Option<&[f32]>,
    ) -> EmbeddingMapping {
        weights::calculate(vector, query)
    }

    fn token_density(token: &TokenDecisionMetadata) -> TokenDensity {
        let char_density = token.byte_range.char_length as f64;
        let byte_density = token.byte_range.byte_length as f64;
        let information_density = token.semantic_entropy.entropy_contribution
            / (token.byte_range.byte_length.max(1) as f64);
        let compression_efficiency = if token.byte_range.byte_length > 0 {
            1.0 - 1.0 / token.byte_range.byte_length as f64
        } else {
            0.0
        };
        let heat_value = 0.4 * (char_density / 10.0).min(1.0)
            + 0.3 * (byte_density / 10.0).min(1.0)
            + 0.3 * (information_density / 2.0).min(1.0);

        TokenDensity {
            token: token.byte_range.original_text.clone(),
            char_density,
            byte_density,
            information_density,
            compression_efficiency,
            heat_value,
            is_high_density: heat_value > 0.7,
            is_low_density: heat_value < 0.3,
        }
    }

    fn aggregate(
        text: &str,
        tokens: &[TokenDecisionMetadata],
        densities: &[TokenDensity],
    ) -> DensityStats {
        if densities.is_empty() {
            return DensityStats {
                mean_char_density: 0.0,
                max_char_density: 0.0,
                min_char_density: 0.0,
                variance_char_density: 0.0,
                total_entropy: 0.0,
                compression_ratio: 0.0,
                fragmentation_index: 0.0,
            };
        }
        let n = densities.len() as f64;
        let mean = densities.iter().map(|d| d.char_density).sum::<f64>() / n;
        let max = densities.iter().map(|d| d.char_density).fold(f64::MIN, f64::max);
        let min = densities.iter().map(|d| d.char_density).fold(f64::MAX, f64::min);
        let variance = densities
            .iter()
            .map(|d| (d.char_density - mean).powi(2))
            .sum::<f64>()
            / n;
        let total_entropy = tokens
            .iter()
            .map(|t| t.semantic_entropy.entropy_contribution)
            .sum();
        let low_count = densities.iter().filter(|d| d.is_low_density).count();

        DensityStats {
            mean_char_density: mean,
            max_char_density: max,
            min_char_density: min,
            variance_char_density: variance,
            total_entropy,
            compression_ratio: text.chars().count() as f64 / n,
            fragmentation_index: low_count as f64 / n,
        }
    }

    /// Run-length segmentation of consecutive same-bucket tokens.
    fn heatmap_regions(densities: &[TokenDensity]) -> Vec<HeatmapRegion> {
        let mut regions = Vec::new();
        let mut iter = densities.iter().enumerate();
        let Some((_, first)) = iter.next() else {
            return regions;
        };
        let mut bucket = HeatBucket::from_heat(first.heat_value);
        let mut start = 0usize;
        let mut heat_sum = first.heat_value;
        let mut count = 1usize;

        for (i, density) in iter {
            let next_bucket = HeatBucket::from_heat(density.heat_value);
            if next_bucket == bucket {
                heat_sum += density.heat_value;
                count += 1;
            } else {
                regions.push(HeatmapRegion {
                    start_index: start,
                    end_index: i - 1,
                    bucket,
                    mean_heat: heat_sum / count as f64,
                });
                bucket = next_bucket;
                start = i;
                heat_sum = density.heat_value;
                count = 1;
            }
        }
        regions.push(HeatmapRegion {
            start_index: start,
            end_index: densities.len() - 1,
            bucket,
            mean_heat: heat_sum / count as f64,
        });
        regions
    }
}
