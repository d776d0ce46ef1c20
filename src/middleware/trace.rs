//! The unified trace record one analysis produces

use crate::compare::ModelComparisonResult;
use crate::density::{DensityResult, EmbeddingMapping, KnowledgeCoverage};
use crate::retrieval::RetrievalAlignment;
use crate::token::{LogicWaterfallData, StabilityMetrics, TokenDecisionMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Non-fatal condition classes reported on a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Many merge decisions were close calls
    Instability,
    /// Vocabulary coverage of the text is poor
    LowCoverage,
    /// Many low-density fragment tokens
    HighFragmentation,
    /// Key query tokens did not match retrieved content
    LowRetrievalQuality,
    /// The embedding provider failed; retrieval analysis was skipped
    EmbeddingFailed,
    /// The adapter exposed no vocabulary; confidence rules degraded
    DegradedVocabulary,
    /// A model was dropped from the comparison
    ModelDropped,
}

/// A structured advisory on the trace. Never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl TraceWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Summary statistics over one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStats {
    pub token_count: usize,
    pub total_entropy: f64,
    pub compression_ratio: f64,
    pub stability_mean: f64,
    pub duration_ms: f64,
}

/// The top-level aggregate for one `analyze()` call.
///
/// Created fresh per call and immutable once returned. Persistence, if
/// any, belongs to external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub input: String,
    /// Primary model the trace was captured with
    pub model: String,
    pub waterfall: LogicWaterfallData,
    pub token_decisions: Vec<TokenDecisionMetadata>,
    pub stability_metrics: Vec<StabilityMetrics>,
    pub density: DensityResult,
    pub knowledge_coverage: KnowledgeCoverage,
    /// Weight statistics of the query embedding, when one was available
    pub embedding_mapping: Option<EmbeddingMapping>,
    /// Retrieval attribution, when chunks and an embedding were given
    pub retrieval: Option<RetrievalAlignment>,
    /// Cross-model comparison, when one was requested
    pub model_comparison: Option<ModelComparisonResult>,
    pub stats: TraceStats,
    pub warnings: Vec<TraceWarning>,
}
