//! Merge-decision stability scoring

use serde::{Deserialize, Serialize};

/// Stability bucket for a merge decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityLevel {
    Stable,
    Moderate,
    Unstable,
    Critical,
}

impl StabilityLevel {
    /// Bucket a stability coefficient.
    ///
    /// Thresholds: stable >= 0.7, moderate >= 0.5, unstable >= 0.3,
    /// critical below.
    pub fn from_coefficient(coefficient: f64) -> Self {
        if coefficient >= 0.7 {
            StabilityLevel::Stable
        } else if coefficient >= 0.5 {
            StabilityLevel::Moderate
        } else if coefficient >= 0.3 {
            StabilityLevel::Unstable
        } else {
            StabilityLevel::Critical
        }
    }
}

/// Confidence margin between the selected merge and its best alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilityMetrics {
    pub token: String,
    /// `1 - second_score / top_score`; 1.0 when no merge competed
    pub coefficient: f64,
    pub top_score: f64,
    pub second_score: f64,
    pub score_delta: f64,
    pub level: StabilityLevel,
}

impl StabilityMetrics {
    /// Build metrics from the selected score and its closest competitor.
    pub fn from_scores(token: impl Into<String>, top_score: f64, second_score: f64) -> Self {
        let coefficient = if top_score > 0.0 {
            (1.0 - second_score / top_score).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self {
            token: token.into(),
            coefficient,
            top_score,
            second_score,
            score_delta: top_score - second_score,
            level: StabilityLevel::from_coefficient(coefficient),
        }
    }

    /// Metrics for a token with no competing merge.
    pub fn uncontested(token: impl Into<String>, top_score: f64) -> Self {
        Self {
            token: token.into(),
            coefficient: 1.0,
            top_score,
            second_score: 0.0,
            score_delta: top_score,
            level: StabilityLevel::Stable,
        }
    }
}
