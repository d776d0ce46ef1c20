//! Cross-model tokenization comparison
//!
//! Runs several tokenizer models over identical input, aligns their
//! tokens character by character, classifies disagreements and
//! recommends the best-fitting model.

mod alignment;

pub use alignment::{AlignedToken, CharacterAlignment};

use crate::adapter::{TokenizerError, TokenizerProvider};
use crate::capture::{CaptureResult, DecisionCaptureEngine};
use crate::density::{DensityCalculator, KnowledgeCoverage};
use crate::token::{StageLevel, TokenDecisionMetadata};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

/// How a disagreement between models is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    SplitDifference,
    MergeDifference,
    UnknownHandling,
}

/// How widely the models disagree at a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Low,
    Medium,
    High,
}

/// One region where models tokenized differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizationDifference {
    /// Character position where the disagreement starts
    pub position: usize,
    pub kind: DifferenceKind,
    /// Covering token text per model at this position
    pub tokens: HashMap<String, String>,
    pub significance: Significance,
}

/// Per-model analysis summary inside a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleModelAnalysis {
    pub model: String,
    pub tokens: Vec<TokenDecisionMetadata>,
    pub coverage: KnowledgeCoverage,
    pub processing_time_ms: f64,
    pub vocab_size: usize,
}

/// Which model to prefer and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecommendation {
    pub best_model: String,
    pub reason: String,
    pub scores: HashMap<String, f64>,
}

/// Full output of a model comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelComparisonResult {
    pub analyses: Vec<SingleModelAnalysis>,
    pub character_alignment: Vec<CharacterAlignment>,
    pub differences: Vec<TokenizationDifference>,
    pub recommendation: ModelRecommendation,
    /// Models requested but dropped because their analysis failed
    pub dropped_models: Vec<String>,
}

/// Orchestrates N capture engines concurrently and diffs their output.
///
/// Engines are cached per model name with single-flight initialization:
/// concurrent requests for the same model await one load instead of
/// starting a second.
pub struct ModelCrossValidator {
    provider: Arc<dyn TokenizerProvider>,
    engines: DashMap<String, Arc<OnceCell<Arc<DecisionCaptureEngine>>>>,
    density: DensityCalculator,
}

impl ModelCrossValidator {
    pub fn new(provider: Arc<dyn TokenizerProvider>) -> Self {
        Self {
            provider,
            engines: DashMap::new(),
            density: DensityCalculator::new(),
        }
    }

    /// Get or initialize the engine for a model.
    ///
    /// A failed load leaves the cell empty, so a later call may retry;
    /// a successful load is cached until `clear()`.
    pub async fn engine(&self, model: &str) -> Result<Arc<DecisionCaptureEngine>, TokenizerError> {
        let cell = self
            .engines
            .entry(model.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let engine = cell
            .get_or_try_init(|| async {
                let engine =
                    DecisionCaptureEngine::initialize(self.provider.as_ref(), model).await?;
                Ok::<_, TokenizerError>(Arc::new(engine))
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    /// Drop all cached engines.
    pub fn clear(&self) {
        self.engines.clear();
    }

    /// Compare the requested models on one text.
    ///
    /// Models are initialized and analyzed concurrently; any model whose
    /// analysis fails is dropped and the comparison proceeds with the
    /// surviving subset.
    pub async fn compare_models(
        &self,
        text: &str,
        models: &[String],
    ) -> Result<ModelComparisonResult, TokenizerError> {
        let mut set: JoinSet<(usize, String, Result<CaptureResult, TokenizerError>)> =
            JoinSet::new();
        for (i, model) in models.iter().enumerate() {
            let cell = self
                .engines
                .entry(model.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();
            let provider = Arc::clone(&self.provider);
            let model = model.clone();
            let text = text.to_string();
            set.spawn(async move {
                let engine = cell
                    .get_or_try_init(|| async {
                        let engine =
                            DecisionCaptureEngine::initialize(provider.as_ref(), &model).await?;
                        Ok::<_, TokenizerError>(Arc::new(engine))
                    })
                    .await;
                let result = match engine {
                    Ok(engine) => engine.capture_decisions(&text).await,
                    Err(e) => Err(e),
                };
                (i, model, result)
            });
        }

        let mut captured: Vec<(usize, String, CaptureResult)> = Vec::new();
        let mut dropped_models = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, model, Ok(result))) => captured.push((i, model, result)),
                Ok((_, model, Err(e))) => {
                    tracing::warn!(model = %model, error = %e, "dropping model from comparison");
                    dropped_models.push(model);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "comparison task panicked");
                }
            }
        }
        // A panicked task yields no join result at all; reconcile
        // against the request list so its model is still reported as
        // dropped.
        for model in models {
            let accounted = captured.iter().any(|(_, m, _)| m == model)
                || dropped_models.iter().any(|m| m == model);
            if !accounted {
                dropped_models.push(model.clone());
            }
        }
        // Restore request order after concurrent joins
        captured.sort_by_key(|(i, _, _)| *i);

        let mut analyses = Vec::with_capacity(captured.len());
        for (_, model, result) in captured {
            let coverage = self.density.calculate_knowledge_coverage(text, &result.token_decisions);
            let vocab_size = match self.engine(&model).await {
                Ok(engine) => engine.vocab_size(),
                Err(_) => 0,
            };
            let processing_time_ms = result
                .waterfall
                .stage(StageLevel::Fullword)
                .map_or(0.0, |s| s.processing_time_ms);
            analyses.push(SingleModelAnalysis {
                model,
                tokens: result.token_decisions,
                coverage,
                processing_time_ms,
                vocab_size,
            });
        }

        let character_alignment = alignment::build_character_alignment(text, &analyses);
        let differences = identify_differences(text, &analyses, &character_alignment);
        let recommendation = generate_recommendation(&analyses, &differences);

        Ok(ModelComparisonResult {
            analyses,
            character_alignment,
            differences,
            recommendation,
            dropped_models,
        })
    }
}

/// Scan character positions left to right and report each disagreement
/// region once.
fn identify_differences(
    text: &str,
    analyses: &[SingleModelAnalysis],
    alignment: &[CharacterAlignment],
) -> Vec<TokenizationDifference> {
    let mut differences = Vec::new();
    if analyses.len() < 2 {
        return differences;
    }
    let char_offsets: Vec<usize> = text.char_indices().map(|(o, _)| o).collect();
    // Byte offset up to which a reported difference's tokens reach;
    // positions inside it would re-report the same disagreement.
    let mut covered_until = 0usize;

    for (position, entry) in alignment.iter().enumerate() {
        let byte_offset = char_offsets[position];
        if byte_offset < covered_until {
            continue;
        }
        let mut texts: Vec<&str> = Vec::new();
        for analysis in analyses {
            if let Some(aligned) = entry.tokens.get(&analysis.model) {
                texts.push(aligned.token.as_str());
            }
        }
        if texts.len() < 2 {
            continue;
        }
        let mut distinct: Vec<&str> = texts.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() <= 1 {
            continue;
        }

        let any_unknown = texts.iter().any(|t| {
            crate::token::is_byte_escape(t) || crate::token::is_unknown_marker(t)
        });
        let longest = texts.iter().map(|t| t.chars().count()).max().unwrap_or(0);
        let shortest = texts.iter().map(|t| t.chars().count()).min().unwrap_or(0);
        let kind = if any_unknown {
            DifferenceKind::UnknownHandling
        } else if longest > 2 && longest as f64 > 1.5 * shortest as f64 {
            DifferenceKind::MergeDifference
        } else {
            DifferenceKind::SplitDifference
        };

        let ratio = distinct.len() as f64 / analyses.len() as f64;
        let significance = if ratio > 0.7 {
            Significance::High
        } else if ratio > 0.4 {
            Significance::Medium
        } else {
            Significance::Low
        };

        let mut tokens = HashMap::new();
        let mut max_end = byte_offset + 1;
        for analysis in analyses {
            if let Some(aligned) = entry.tokens.get(&analysis.model) {
                tokens.insert(analysis.model.clone(), aligned.token.clone());
                max_end = max_end.max(aligned.end);
            }
        }
        covered_until = max_end;

        differences.push(TokenizationDifference {
            position,
            kind,
            tokens,
            significance,
        });
    }
    differences
}

/// Score each model and pick the best.
///
/// score = 40 x coverage + 20 x (mean tokens / own tokens)
///       + 10 x (mean time / own time) + 30 x consistency,
/// where consistency is the fraction of the model's difference-site
/// tokens that match the majority across models.
fn generate_recommendation(
    analyses: &[SingleModelAnalysis],
    differences: &[TokenizationDifference],
) -> ModelRecommendation {
    if analyses.is_empty() {
        return ModelRecommendation {
            best_model: String::new(),
            reason: "no model produced a usable analysis".to_string(),
            scores: HashMap::new(),
        };
    }

    let n = analyses.len() as f64;
    let mean_tokens = analyses.iter().map(|a| a.tokens.len() as f64).sum::<f64>() / n;
    let mean_time = analyses.iter().map(|a| a.processing_time_ms).sum::<f64>() / n;

    let mut scores = HashMap::new();
    let mut best_model = analyses[0].model.clone();
    let mut best_score = f64::NEG_INFINITY;
    for analysis in analyses {
        let token_economy = if analysis.tokens.is_empty() {
            0.0
        } else {
            mean_tokens / analysis.tokens.len() as f64
        };
        let speed = mean_time / analysis.processing_time_ms.max(1e-6);
        let consistency = consistency_for(&analysis.model, differences);
        let score = 40.0 * analysis.coverage.score
            + 20.0 * token_economy
            + 10.0 * speed
            + 30.0 * consistency;
        scores.insert(analysis.model.clone(), score);
        // Strictly-greater keeps the first model on ties
        if score > best_score {
            best_model = analysis.model.clone();
            best_score = score;
        }
    }

    ModelRecommendation {
        best_model,
        reason: format!(
            "highest composite score {best_score:.1} across coverage, token economy, speed and consistency"
        ),
        scores,
    }
}

/// Fraction of difference sites where the model agrees with the
/// majority token; 1.0 when the model participates in no differences.
fn consistency_for(model: &str, differences: &[TokenizationDifference]) -> f64 {
    let mut participated = 0usize;
    let mut agreed = 0usize;
    for difference in differences {
        let Some(own) = difference.tokens.get(model) else {
            continue;
        };
        participated += 1;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in difference.tokens.values() {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
        let majority = counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(token, _)| *token);
        if majority == Some(own.as_str()) {
            agreed += 1;
        }
    }
    if participated == 0 {
        1.0
    } else {
        agreed as f64 / participated as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{HeuristicProvider, HeuristicTokenizer, TokenizerAdapter};
    use async_trait::async_trait;

    struct PanickingTokenizer;

    #[async_trait]
    impl TokenizerAdapter for PanickingTokenizer {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn encode(&self, _text: &str) -> Result<Vec<u32>, TokenizerError> {
            panic!("tokenizer binding crashed")
        }

        async fn decode_batch(&self, _ids: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
            Ok(Vec::new())
        }

        fn vocabulary(&self) -> Arc<HashMap<String, u32>> {
            Arc::new(HashMap::new())
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl TokenizerProvider for PanickingProvider {
        async fn load(
            &self,
            model: &str,
        ) -> Result<Arc<dyn TokenizerAdapter>, TokenizerError> {
            if model == "broken" {
                Ok(Arc::new(PanickingTokenizer))
            } else {
                Ok(Arc::new(HeuristicTokenizer::word_level(model)))
            }
        }
    }

    fn validator() -> ModelCrossValidator {
        ModelCrossValidator::new(Arc::new(HeuristicProvider::new()))
    }

    fn models(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn identical_models_produce_no_differences() {
        let result = validator()
            .compare_models("hello world", &models(&["m1", "m1"]))
            .await
            .unwrap();
        assert_eq!(result.analyses.len(), 2);
        assert!(result.differences.is_empty());
        // Duplicate names collapse to one score entry, numerically equal
        assert_eq!(result.recommendation.scores.len(), 1);
    }

    #[tokio::test]
    async fn divergent_models_report_differences() {
        let result = validator()
            .compare_models("hello world", &models(&["word-model", "split-char"]))
            .await
            .unwrap();
        assert!(!result.differences.is_empty());
        for difference in &result.differences {
            assert_eq!(difference.kind, DifferenceKind::MergeDifference);
        }
    }

    #[tokio::test]
    async fn character_alignment_spans_every_character() {
        let text = "hello world";
        let result = validator()
            .compare_models(text, &models(&["a", "b-char"]))
            .await
            .unwrap();
        assert_eq!(result.character_alignment.len(), text.chars().count());
    }

    #[tokio::test]
    async fn failed_model_is_dropped_not_fatal() {
        let provider = HeuristicProvider::with_known_models(vec!["good".to_string()]);
        let validator = ModelCrossValidator::new(Arc::new(provider));
        let result = validator
            .compare_models("hello", &models(&["good", "missing"]))
            .await
            .unwrap();
        assert_eq!(result.analyses.len(), 1);
        assert_eq!(result.dropped_models, vec!["missing".to_string()]);
        assert_eq!(result.recommendation.best_model, "good");
    }

    #[tokio::test]
    async fn panicked_model_counts_as_dropped() {
        let validator = ModelCrossValidator::new(Arc::new(PanickingProvider));
        let result = validator
            .compare_models("hello world", &models(&["good", "broken"]))
            .await
            .unwrap();
        assert_eq!(result.analyses.len(), 1);
        assert_eq!(result.analyses[0].model, "good");
        assert_eq!(result.dropped_models, vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn engine_cache_is_single_flight() {
        let validator = Arc::new(validator());
        let first = validator.engine("shared").await.unwrap();
        let second = validator.engine("shared").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn concurrent_engine_requests_share_initialization() {
        let validator = Arc::new(validator());
        let mut set = JoinSet::new();
        for _ in 0..8 {
            let validator = Arc::clone(&validator);
            set.spawn(async move { validator.engine("popular").await.unwrap() });
        }
        let mut engines = Vec::new();
        while let Some(engine) = set.join_next().await {
            engines.push(engine.unwrap());
        }
        for engine in &engines[1..] {
            assert!(Arc::ptr_eq(&engines[0], engine));
        }
    }

    #[tokio::test]
    async fn clear_resets_engine_cache() {
        let validator = validator();
        let first = validator.engine("m").await.unwrap();
        validator.clear();
        let second = validator.engine("m").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn consistency_is_one_without_participation() {
        assert_eq!(consistency_for("m", &[]), 1.0);
    }

    #[test]
    fn recommendation_tie_break_is_first_model() {
        let coverage = crate::density::DensityCalculator::new()
            .calculate_knowledge_coverage("x", &[]);
        let mk = |name: &str| SingleModelAnalysis {
            model: name.to_string(),
            tokens: Vec::new(),
            coverage: coverage.clone(),
            processing_time_ms: 1.0,
            vocab_size: 0,
        };
        let recommendation = generate_recommendation(&[mk("first"), mk("second")], &[]);
        assert_eq!(recommendation.best_model, "first");
    }
}
