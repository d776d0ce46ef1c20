//! Analysis middleware orchestrator
//!
//! Sequences decision capture, density/coverage scoring, retrieval
//! alignment and optional model comparison over a single query into one
//! unified trace, emitting progress events at fixed milestones.

mod trace;

pub use trace::{TraceContext, TraceStats, TraceWarning, WarningKind};

use crate::adapter::{EmbeddingProvider, RetrievedChunk, TokenizerError, TokenizerProvider};
use crate::capture::DecisionCaptureEngine;
use crate::compare::{ModelComparisonResult, ModelCrossValidator};
use crate::density::{DensityCalculator, DensityResult, KnowledgeCoverage};
use crate::retrieval::RetrievalAlignmentMapper;
use crate::token::{LogicWaterfallData, StabilityLevel, TokenDecisionMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can surface from the middleware.
///
/// Only tokenizer load/analysis failures and missing initialization
/// reach callers; every other degraded condition, embedding failures
/// included, becomes a trace warning instead.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("middleware not initialized; call init() first")]
    NotInitialized,
}

/// Result type for middleware operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Progress event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    StageComplete,
    AnalysisComplete,
}

/// A milestone notification. Progress is monotonically increasing
/// within one `analyze()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub stage: String,
    pub progress: f64,
    pub timestamp: DateTime<Utc>,
}

/// Synchronous progress callback. Treated as fire-and-forget; it must
/// not block the pipeline.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Warning thresholds and pipeline tuning.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Instability warning above this fraction of unstable tokens
    pub instability_threshold: f64,
    /// Coverage warning below this score
    pub low_coverage_threshold: f64,
    /// Fragmentation warning above this index
    pub fragmentation_threshold: f64,
    /// Retrieval-quality warning below this score
    pub low_retrieval_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self {
            instability_threshold: 0.3,
            low_coverage_threshold: 0.5,
            fragmentation_threshold: 0.5,
            low_retrieval_threshold: 0.5,
        }
    }
}

/// Per-call inputs beyond the text itself.
#[derive(Default)]
pub struct AnalysisOptions {
    /// Precomputed query embedding; computed via the embedder when
    /// absent and retrieval analysis is requested
    pub query_embedding: Option<Vec<f32>>,
    /// Chunks already retrieved for this query
    pub retrieved_chunks: Vec<RetrievedChunk>,
    /// Real per-token embeddings aligned with the final token sequence
    pub token_embeddings: Option<Vec<Vec<f32>>>,
    /// Additional models to compare against the primary
    pub compare_models: Vec<String>,
    pub on_progress: Option<ProgressCallback>,
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    pub fn with_retrieved_chunks(mut self, chunks: Vec<RetrievedChunk>) -> Self {
        self.retrieved_chunks = chunks;
        self
    }

    pub fn with_token_embeddings(mut self, embeddings: Vec<Vec<f32>>) -> Self {
        self.token_embeddings = Some(embeddings);
        self
    }

    pub fn with_compare_models(mut self, models: Vec<String>) -> Self {
        self.compare_models = models;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Output of `quick_analyze`: no retrieval, no model comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnalysis {
    pub waterfall: LogicWaterfallData,
    pub token_decisions: Vec<TokenDecisionMetadata>,
    pub density: DensityResult,
    pub knowledge_coverage: KnowledgeCoverage,
}

/// The orchestrator. Owned and passed explicitly by the caller; there
/// is no process-wide default instance.
pub struct AnalysisMiddleware {
    provider: Arc<dyn TokenizerProvider>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    engine: Option<DecisionCaptureEngine>,
    model: String,
    density: DensityCalculator,
    mapper: RetrievalAlignmentMapper,
    validator: ModelCrossValidator,
    config: AnalysisConfig,
}

impl AnalysisMiddleware {
    pub fn new(provider: Arc<dyn TokenizerProvider>) -> Self {
        Self {
            validator: ModelCrossValidator::new(Arc::clone(&provider)),
            provider,
            embedder: None,
            engine: None,
            model: String::new(),
            density: DensityCalculator::new(),
            mapper: RetrievalAlignmentMapper::new(),
            config: AnalysisConfig::new(),
        }
    }

    /// Attach an embedding provider for on-demand query embeddings.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Replace the retrieval mapper (e.g. to swap embedding strategies).
    pub fn with_mapper(mut self, mapper: RetrievalAlignmentMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the primary model. Fatal on load failure.
    pub async fn init(&mut self, model: &str) -> AnalysisResult<()> {
        let engine = DecisionCaptureEngine::initialize(self.provider.as_ref(), model).await?;
        tracing::info!(model, vocab_size = engine.vocab_size(), "middleware initialized");
        self.engine = Some(engine);
        self.model = model.to_string();
        Ok(())
    }

    /// Drop the primary engine and all cached comparison engines.
    pub fn dispose(&mut self) {
        self.engine = None;
        self.model.clear();
        self.validator.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Run the full analysis pipeline over one text.
    ///
    /// Strictly ordered: capture, density, retrieval, comparison. Once
    /// initialization has succeeded a trace is always produced; degraded
    /// conditions surface as warnings, not errors.
    pub async fn analyze(
        &self,
        text: &str,
        options: AnalysisOptions,
    ) -> AnalysisResult<TraceContext> {
        let engine = self.engine.as_ref().ok_or(AnalysisError::NotInitialized)?;
        let created_at = Utc::now();
        let started = Instant::now();
        tracing::info!(model = %self.model, chars = text.chars().count(), "analysis started");

        let capture = engine.capture_decisions(text).await?;
        emit(&options.on_progress, ProgressKind::StageComplete, "decision_capture", 0.25);

        let density = self.density.calculate(text, &capture.token_decisions);
        let knowledge_coverage = self
            .density
            .calculate_knowledge_coverage(text, &capture.token_decisions);
        emit(&options.on_progress, ProgressKind::StageComplete, "density", 0.45);

        let mut embedding_warning = None;
        let query_embedding = match &options.query_embedding {
            Some(embedding) => Some(embedding.clone()),
            None => match (&self.embedder, options.retrieved_chunks.is_empty()) {
                (Some(embedder), false) => match embedder.embed_query(text).await {
                    Ok(embedding) => Some(embedding),
                    Err(e) => {
                        tracing::warn!(error = %e, "query embedding failed; skipping retrieval analysis");
                        embedding_warning = Some(TraceWarning::new(
                            WarningKind::EmbeddingFailed,
                            format!("query embedding failed: {e}; retrieval analysis skipped"),
                        ));
                        None
                    }
                },
                _ => None,
            },
        };

        let embedding_mapping = query_embedding
            .as_deref()
            .map(|embedding| self.density.calculate_embedding_weights(embedding, None));

        let retrieval = query_embedding.as_deref().map(|embedding| {
            self.mapper.analyze(
                &capture.token_decisions,
                embedding,
                options.token_embeddings.as_deref(),
                &options.retrieved_chunks,
            )
        });
        emit(&options.on_progress, ProgressKind::StageComplete, "retrieval", 0.7);

        let model_comparison = if options.compare_models.is_empty() {
            None
        } else {
            let mut models = Vec::with_capacity(options.compare_models.len() + 1);
            models.push(self.model.clone());
            models.extend(options.compare_models.iter().cloned());
            Some(self.validator.compare_models(text, &models).await?)
        };
        emit(&options.on_progress, ProgressKind::StageComplete, "comparison", 0.9);

        let mut warnings = self.collect_warnings(
            engine,
            &capture.stability_metrics,
            &knowledge_coverage,
            &density,
            retrieval.as_ref(),
            &options.retrieved_chunks,
            model_comparison.as_ref(),
        );
        warnings.extend(embedding_warning);

        let stability_mean = if capture.stability_metrics.is_empty() {
            0.0
        } else {
            capture
                .stability_metrics
                .iter()
                .map(|m| m.coefficient)
                .sum::<f64>()
                / capture.stability_metrics.len() as f64
        };
        let stats = TraceStats {
            token_count: capture.token_decisions.len(),
            total_entropy: density.stats.total_entropy,
            compression_ratio: capture.waterfall.compression_ratio,
            stability_mean,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        emit(&options.on_progress, ProgressKind::AnalysisComplete, "analysis", 1.0);
        tracing::info!(
            model = %self.model,
            tokens = stats.token_count,
            warnings = warnings.len(),
            "analysis complete"
        );

        Ok(TraceContext {
            id: Uuid::new_v4(),
            created_at,
            completed_at: Utc::now(),
            input: text.to_string(),
            model: self.model.clone(),
            waterfall: capture.waterfall,
            token_decisions: capture.token_decisions,
            stability_metrics: capture.stability_metrics,
            density,
            knowledge_coverage,
            embedding_mapping,
            retrieval,
            model_comparison,
            stats,
            warnings,
        })
    }

    /// Capture + density + coverage only.
    pub async fn quick_analyze(&self, text: &str) -> AnalysisResult<QuickAnalysis> {
        let engine = self.engine.as_ref().ok_or(AnalysisError::NotInitialized)?;
        let capture = engine.capture_decisions(text).await?;
        let density = self.density.calculate(text, &capture.token_decisions);
        let knowledge_coverage = self
            .density
            .calculate_knowledge_coverage(text, &capture.token_decisions);
        Ok(QuickAnalysis {
            waterfall: capture.waterfall,
            token_decisions: capture.token_decisions,
            density,
            knowledge_coverage,
        })
    }

    /// Compare models without running the rest of the pipeline.
    pub async fn compare_models(
        &self,
        text: &str,
        models: &[String],
    ) -> AnalysisResult<ModelComparisonResult> {
        Ok(self.validator.compare_models(text, models).await?)
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_warnings(
        &self,
        engine: &DecisionCaptureEngine,
        stability: &[crate::token::StabilityMetrics],
        coverage: &KnowledgeCoverage,
        density: &DensityResult,
        retrieval: Option<&crate::retrieval::RetrievalAlignment>,
        chunks: &[RetrievedChunk],
        comparison: Option<&ModelComparisonResult>,
    ) -> Vec<TraceWarning> {
        let mut warnings = Vec::new();

        if engine.vocab_size() == 0 {
            warnings.push(TraceWarning::new(
                WarningKind::DegradedVocabulary,
                "tokenizer exposed no vocabulary; confidence and coverage are degraded",
            ));
        }

        if !stability.is_empty() {
            let unstable = stability
                .iter()
                .filter(|m| {
                    matches!(m.level, StabilityLevel::Unstable | StabilityLevel::Critical)
                })
                .count();
            let fraction = unstable as f64 / stability.len() as f64;
            if fraction > self.config.instability_threshold {
                warnings.push(TraceWarning::new(
                    WarningKind::Instability,
                    format!("{:.0}% of merge decisions were close calls", fraction * 100.0),
                ));
            }
        }

        if coverage.score < self.config.low_coverage_threshold {
            warnings.push(TraceWarning::new(
                WarningKind::LowCoverage,
                format!(
                    "knowledge coverage {:.2} ({:?}) for domain '{}'",
                    coverage.score, coverage.level, coverage.domain_recognition.domain
                ),
            ));
        }

        if density.stats.fragmentation_index > self.config.fragmentation_threshold {
            warnings.push(TraceWarning::new(
                WarningKind::HighFragmentation,
                format!(
                    "{:.0}% of tokens are low-density fragments",
                    density.stats.fragmentation_index * 100.0
                ),
            ));
        }

        if let Some(retrieval) = retrieval {
            if !chunks.is_empty()
                && retrieval.quality.quality_score < self.config.low_retrieval_threshold
            {
                warnings.push(TraceWarning::new(
                    WarningKind::LowRetrievalQuality,
                    format!(
                        "retrieval quality {:.2}: {}",
                        retrieval.quality.quality_score,
                        retrieval.quality.issues.join("; ")
                    ),
                ));
            }
        }

        if let Some(comparison) = comparison {
            for model in &comparison.dropped_models {
                warnings.push(TraceWarning::new(
                    WarningKind::ModelDropped,
                    format!("model '{model}' failed analysis and was dropped from the comparison"),
                ));
            }
        }

        warnings
    }
}

fn emit(callback: &Option<ProgressCallback>, kind: ProgressKind, stage: &str, progress: f64) {
    if let Some(callback) = callback {
        callback(ProgressEvent {
            kind,
            stage: stage.to_string(),
            progress,
            timestamp: Utc::now(),
        });
    }
}
