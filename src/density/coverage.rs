//! Knowledge coverage scoring
//!
//! Estimates how well a model's vocabulary matches a text: a weighted
//! blend of known-token ratio, fallback ratio, frequency and a
//! keyword-table domain signal.

use crate::token::{is_byte_escape, DecisionType, TokenDecisionMetadata};
use serde::{Deserialize, Serialize};

/// Coverage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageLevel {
    Expert,
    Familiar,
    Basic,
    Unfamiliar,
    Unknown,
}

impl CoverageLevel {
    /// Thresholds: expert >= 0.9, familiar >= 0.75, basic >= 0.5,
    /// unfamiliar >= 0.25.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            CoverageLevel::Expert
        } else if score >= 0.75 {
            CoverageLevel::Familiar
        } else if score >= 0.5 {
            CoverageLevel::Basic
        } else if score >= 0.25 {
            CoverageLevel::Unfamiliar
        } else {
            CoverageLevel::Unknown
        }
    }
}

/// Domain guessed from keyword hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecognition {
    pub domain: String,
    pub confidence: f64,
}

/// Composite coverage score for one text under one vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeCoverage {
    /// Weighted blend in [0, 1]
    pub score: f64,
    pub known_token_ratio: f64,
    pub fallback_ratio: f64,
    pub avg_token_frequency: f64,
    pub domain_recognition: DomainRecognition,
    pub level: CoverageLevel,
}

/// Fixed keyword table; hits drive domain confidence.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "technology",
        &["code", "data", "model", "server", "token", "query", "search", "api", "software"],
    ),
    (
        "science",
        &["theory", "experiment", "hypothesis", "energy", "cell", "quantum", "research"],
    ),
    (
        "medicine",
        &["patient", "diagnosis", "treatment", "clinical", "symptom", "dose", "therapy"],
    ),
    (
        "finance",
        &["market", "price", "asset", "revenue", "invest", "trading", "capital"],
    ),
    (
        "legal",
        &["contract", "clause", "liability", "statute", "court", "plaintiff", "regulation"],
    ),
];

/// Recognize a domain by counting keyword hits in the text.
pub(crate) fn recognize_domain(text: &str) -> DomainRecognition {
    let lower = text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for (domain, keywords) in DOMAIN_KEYWORDS {
        let hits = keywords.iter().filter(|kw| lower.contains(**kw)).count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((domain, hits));
        }
    }
    match best {
        Some((domain, hits)) => DomainRecognition {
            domain: domain.to_string(),
            confidence: (0.3 + 0.15 * hits as f64).min(0.95),
        },
        None => DomainRecognition {
            domain: "general".to_string(),
            confidence: 0.3,
        },
    }
}

/// Score coverage of `tokens` for `text`.
///
/// Never fails: an empty token set simply degrades the score. A missing
/// vocabulary shows up here indirectly, through the fallback decisions
/// and confidences the capture engine assigned.
pub(crate) fn calculate(text: &str, tokens: &[TokenDecisionMetadata]) -> KnowledgeCoverage {
    let n = tokens.len();
    let (known, fallback, freq_sum) = tokens.iter().fold(
        (0usize, 0usize, 0.0f64),
        |(known, fallback, freq_sum), token| {
            let is_fallback =
                token.decision_type == DecisionType::Fallback || is_byte_escape(&token.token);
            (
                known + usize::from(!is_fallback),
                fallback + usize::from(is_fallback),
                freq_sum + token.semantic_entropy.frequency,
            )
        },
    );

    let known_token_ratio = if n > 0 { known as f64 / n as f64 } else { 0.0 };
    let fallback_ratio = if n > 0 { fallback as f64 / n as f64 } else { 0.0 };
    let avg_token_frequency = if n > 0 { freq_sum / n as f64 } else { 0.0 };

    let domain_recognition = recognize_domain(text);
    let score = (0.4 * known_token_ratio
        + 0.3 * (1.0 - fallback_ratio)
        + 0.15 * (100.0 * avg_token_frequency).min(1.0)
        + 0.15 * domain_recognition.confidence)
        .clamp(0.0, 1.0);

    KnowledgeCoverage {
        score,
        known_token_ratio,
        fallback_ratio,
        avg_token_frequency,
        domain_recognition,
        level: CoverageLevel::from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{ByteRange, PathLogic, SemanticEntropy};

    fn token(text: &str, decision_type: DecisionType, frequency: f64) -> TokenDecisionMetadata {
        TokenDecisionMetadata {
            token_id: 42,
            token: text.to_string(),
            path_logic: PathLogic::default(),
            semantic_entropy: SemanticEntropy {
                frequency,
                ..SemanticEntropy::default()
            },
            byte_range: ByteRange::new(0, text),
            decision_type,
            confidence: 0.9,
        }
    }

    #[test]
    fn level_boundaries_exact() {
        assert_eq!(CoverageLevel::from_score(0.9), CoverageLevel::Expert);
        assert_eq!(CoverageLevel::from_score(0.899), CoverageLevel::Familiar);
        assert_eq!(CoverageLevel::from_score(0.75), CoverageLevel::Familiar);
        assert_eq!(CoverageLevel::from_score(0.5), CoverageLevel::Basic);
        assert_eq!(CoverageLevel::from_score(0.25), CoverageLevel::Unfamiliar);
        assert_eq!(CoverageLevel::from_score(0.249), CoverageLevel::Unknown);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let tokens = vec![
            token("hello", DecisionType::Direct, 0.5),
            token("<0xF0>", DecisionType::Fallback, 1.0),
        ];
        let coverage = calculate("hello", &tokens);
        assert!(coverage.score >= 0.0 && coverage.score <= 1.0);
    }

    #[test]
    fn all_fallback_text_is_unknown() {
        let tokens = vec![
            token("<0xF0>", DecisionType::Fallback, 0.001),
            token("<0x9F>", DecisionType::Fallback, 0.001),
            token("<0x8E>", DecisionType::Fallback, 0.001),
        ];
        let coverage = calculate("🎉", &tokens);
        assert_eq!(coverage.known_token_ratio, 0.0);
        assert_eq!(coverage.fallback_ratio, 1.0);
        assert_eq!(coverage.level, CoverageLevel::Unknown);
    }

    #[test]
    fn byte_escape_text_counts_as_fallback_regardless_of_type() {
        let tokens = vec![token("<0xAB>", DecisionType::Direct, 0.01)];
        let coverage = calculate("x", &tokens);
        assert_eq!(coverage.fallback_ratio, 1.0);
    }

    #[test]
    fn domain_recognized_from_keywords() {
        let recognition = recognize_domain("the model encodes a query over token data");
        assert_eq!(recognition.domain, "technology");
        assert!(recognition.confidence > 0.3);
        assert!(recognition.confidence <= 0.95);
    }

    #[test]
    fn unmatched_text_falls_back_to_general() {
        let recognition = recognize_domain("zxqv mmmm qqq");
        assert_eq!(recognition.domain, "general");
        assert_eq!(recognition.confidence, 0.3);
    }

    #[test]
    fn empty_tokens_degrade_not_panic() {
        let coverage = calculate("anything", &[]);
        assert_eq!(coverage.known_token_ratio, 0.0);
        assert!(coverage.score >= 0.0 && coverage.score <= 1.0);
    }
}
