//! Cross-model comparison tests
//!
//! Runs the validator through the middleware against heuristic models
//! with different granularities and checks alignment, difference
//! classification and the recommendation.

use std::sync::Arc;
use tokenscope::{AnalysisMiddleware, HeuristicProvider, ModelCrossValidator};

fn middleware() -> AnalysisMiddleware {
    AnalysisMiddleware::new(Arc::new(HeuristicProvider::new()))
}

#[tokio::test]
async fn identical_models_agree_everywhere() {
    let result = middleware()
        .compare_models(
            "hello world",
            &["same".to_string(), "same".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(result.analyses.len(), 2);
    assert!(result.differences.is_empty());
    assert!(result.dropped_models.is_empty());
    assert_eq!(result.recommendation.best_model, "same");
}

#[tokio::test]
async fn granularity_mismatch_is_detected() {
    let result = middleware()
        .compare_models(
            "hello world data",
            &["word".to_string(), "word-char".to_string()],
        )
        .await
        .unwrap();
    assert!(!result.differences.is_empty());
    for difference in &result.differences {
        assert!(difference.position < "hello world data".chars().count());
        assert!(!difference.tokens.is_empty());
    }
}

#[tokio::test]
async fn alignment_covers_every_character() {
    let text = "hello world";
    let result = middleware()
        .compare_models(text, &["a".to_string(), "b-char".to_string()])
        .await
        .unwrap();
    assert_eq!(result.character_alignment.len(), text.chars().count());
    for (i, entry) in result.character_alignment.iter().enumerate() {
        assert_eq!(entry.position, i);
    }
}

#[tokio::test]
async fn recommendation_scores_every_surviving_model() {
    let result = middleware()
        .compare_models(
            "hello world data token",
            &["coarse".to_string(), "fine-char".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(result.recommendation.scores.len(), 2);
    assert!(result
        .recommendation
        .scores
        .contains_key(&result.recommendation.best_model));
    assert!(!result.recommendation.reason.is_empty());
    for score in result.recommendation.scores.values() {
        assert!(*score >= 0.0);
    }
}

#[tokio::test]
async fn failed_model_is_dropped_not_fatal() {
    let provider = Arc::new(HeuristicProvider::with_known_models(vec![
        "known".to_string(),
    ]));
    let validator = ModelCrossValidator::new(provider);
    let result = validator
        .compare_models("hello world", &["known".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(result.analyses.len(), 1);
    assert_eq!(result.dropped_models, vec!["missing".to_string()]);
    assert_eq!(result.recommendation.best_model, "known");
}

#[tokio::test]
async fn repeated_comparisons_reuse_cached_engines() {
    let validator = ModelCrossValidator::new(Arc::new(HeuristicProvider::new()));
    let models = vec!["m1".to_string(), "m2".to_string()];
    let first = validator.compare_models("hello world", &models).await.unwrap();
    let second = validator.compare_models("hello world", &models).await.unwrap();
    assert_eq!(first.analyses.len(), second.analyses.len());
    for (a, b) in first.analyses.iter().zip(second.analyses.iter()) {
        assert_eq!(a.tokens.len(), b.tokens.len());
    }
    let engine_first = validator.engine("m1").await.unwrap();
    let engine_again = validator.engine("m1").await.unwrap();
    assert!(Arc::ptr_eq(&engine_first, &engine_again));
}

#[tokio::test]
async fn processing_times_are_recorded() {
    let result = middleware()
        .compare_models("hello world", &["x".to_string(), "y".to_string()])
        .await
        .unwrap();
    for analysis in &result.analyses {
        assert!(analysis.processing_time_ms >= 0.0);
        assert!(analysis.vocab_size > 0);
    }
}
