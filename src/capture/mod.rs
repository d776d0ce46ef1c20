//! Decision capture engine
//!
//! Wraps one tokenizer adapter and replays the 4-stage decomposition
//! waterfall (bytes, characters, subwords, fullwords), synthesizing the
//! intermediate merge decisions a greedy subword tokenizer would have
//! made. The tokenizer only reports final ids; everything between is
//! reconstructed, so merge records and byte ranges are best-effort.

mod stages;

pub use stages::{char_class_entropy, char_class_frequency, BYTE_ENTROPY};

use crate::adapter::{TokenizerAdapter, TokenizerError, TokenizerProvider};
use crate::token::{
    ByteRange, DecisionType, DiscardedAlternative, LogicWaterfallData, MergeOperation, MergePart,
    PathLogic, SemanticEntropy, StabilityMetrics, StageLevel, TokenDecisionMetadata,
    WaterfallStage,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Continuation prefixes stripped before aligning decoded tokens.
const MERGE_PREFIXES: &[&str] = &["##", "\u{2581}", "\u{120}"];

/// Everything `capture_decisions` produces for one text.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub waterfall: LogicWaterfallData,
    /// Fullword-stage tokens with path indices reassigned to final order
    pub token_decisions: Vec<TokenDecisionMetadata>,
    pub stability_metrics: Vec<StabilityMetrics>,
}

/// Replays tokenization decisions for one loaded tokenizer.
pub struct DecisionCaptureEngine {
    adapter: Arc<dyn TokenizerAdapter>,
    vocab: Arc<HashMap<String, u32>>,
}

impl DecisionCaptureEngine {
    /// Load the named model through the provider.
    ///
    /// # Errors
    ///
    /// Propagates the provider's load failure; this is the only fatal
    /// error class in the pipeline. A missing vocabulary is not an
    /// error — the engine degrades to numeric-id confidence rules.
    pub async fn initialize(
        provider: &dyn TokenizerProvider,
        model: &str,
    ) -> Result<Self, TokenizerError> {
        let adapter = provider.load(model).await?;
        let vocab = adapter.vocabulary();
        Ok(Self { adapter, vocab })
    }

    /// Wrap an already-constructed adapter.
    pub fn from_adapter(adapter: Arc<dyn TokenizerAdapter>) -> Self {
        let vocab = adapter.vocabulary();
        Self { adapter, vocab }
    }

    pub fn model_name(&self) -> &str {
        self.adapter.model_name()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Replay the full waterfall for one text.
    pub async fn capture_decisions(&self, text: &str) -> Result<CaptureResult, TokenizerError> {
        let total_start = Instant::now();

        let start = Instant::now();
        let byte = stages::byte_stage(text, ms_since(start));

        let start = Instant::now();
        let character = stages::character_stage(text, ms_since(start));

        let subword = self.tokenizer_stage(text, StageLevel::Subword).await?;
        let fullword = self.tokenizer_stage(text, StageLevel::Fullword).await?;

        let final_token_count = fullword.tokens.len();
        let char_count = text.chars().count();
        let compression_ratio = if final_token_count > 0 {
            char_count as f64 / final_token_count as f64
        } else {
            0.0
        };

        let mut token_decisions = fullword.tokens.clone();
        for (i, token) in token_decisions.iter_mut().enumerate() {
            token.path_logic.selected_path_index = i;
        }
        let stability_metrics = self.score_stability(&token_decisions, &fullword.merge_operations);

        let waterfall = LogicWaterfallData {
            input: text.to_string(),
            stages: vec![byte, character, subword, fullword],
            total_time_ms: ms_since(total_start),
            final_token_count,
            compression_ratio,
        };

        Ok(CaptureResult {
            waterfall,
            token_decisions,
            stability_metrics,
        })
    }

    /// Run the real tokenizer and reconstruct per-token decisions.
    ///
    /// Subword and fullword stages share this derivation; they are kept
    /// as separate stages so consumers can diff the two granularities
    /// independently.
    async fn tokenizer_stage(
        &self,
        text: &str,
        level: StageLevel,
    ) -> Result<WaterfallStage, TokenizerError> {
        let start = Instant::now();
        let ids = self.adapter.encode(text).await?;
        let groups: Vec<Vec<u32>> = ids.iter().map(|id| vec![*id]).collect();
        let raw_texts = self.adapter.decode_batch(&groups).await?;

        let mut tokens = Vec::with_capacity(ids.len());
        let mut merge_operations = Vec::new();
        let mut cursor = 0usize; // running byte offset into `text`
        let mut total_entropy = 0.0;

        for (i, (id, raw)) in ids.iter().zip(raw_texts.iter()).enumerate() {
            let (clean, had_prefix) = strip_merge_prefix(raw);
            let is_fallback =
                crate::token::is_byte_escape(raw) || crate::token::is_unknown_marker(raw);

            // Forward substring search from the last consumed offset;
            // fall back to the running offset when the cleaned text is
            // empty, unlocatable, or a marker. Known approximation.
            let byte_range = if !clean.is_empty() && !is_fallback {
                match text.get(cursor..).and_then(|rest| rest.find(clean.as_str())) {
                    Some(found) => {
                        let range = ByteRange::new(cursor + found, clean.clone());
                        cursor = range.end;
                        range
                    }
                    None => ByteRange::new(cursor, clean.clone()),
                }
            } else {
                ByteRange::new(cursor, clean.clone())
            };

            let decision_type = if is_fallback {
                DecisionType::Fallback
            } else if had_prefix {
                DecisionType::Merge
            } else if byte_range.char_length == 1 {
                DecisionType::Split
            } else {
                DecisionType::Direct
            };
            let confidence = self.confidence_for(&clean, *id, decision_type);

            // Class entropy scaled by a subword compression discount:
            // a merged token carries less surprise per character than
            // its characters do in isolation.
            let entropy_contribution =
                0.25 * clean.chars().map(char_class_entropy).sum::<f64>();
            total_entropy += entropy_contribution;

            let vocab_size = self.vocab.len();
            let frequency = 1.0 / (1.0 + f64::from(*id));
            let idf = (1.0 + vocab_size as f64 / (1.0 + f64::from(*id))).ln();

            tokens.push(TokenDecisionMetadata {
                token_id: *id,
                token: raw.clone(),
                path_logic: PathLogic {
                    depth: level.depth(),
                    hit_count: usize::from(self.vocab.contains_key(clean.as_str())),
                    selected_path_index: i,
                    ..PathLogic::default()
                },
                semantic_entropy: SemanticEntropy {
                    entropy_contribution,
                    entropy_ratio: 0.0,
                    frequency,
                    idf,
                },
                byte_range,
                decision_type,
                confidence,
            });
        }

        for token in &mut tokens {
            token.semantic_entropy.entropy_ratio = if total_entropy > 0.0 {
                token.semantic_entropy.entropy_contribution / total_entropy
            } else {
                0.0
            };
        }

        // Synthesize merge steps: every token after the first with more
        // than one character pairs with its predecessor. The right side
        // is approximated as the merged token's first character.
        let mut step = 0usize;
        for i in 1..tokens.len() {
            let merged_chars = tokens[i].byte_range.char_length;
            if merged_chars <= 1 {
                continue;
            }
            let merged_text = tokens[i].byte_range.original_text.clone();
            let merged_id = tokens[i].token_id;
            let left_text = tokens[i - 1].byte_range.original_text.clone();
            let left_id = tokens[i - 1].token_id;
            let first_char: String = merged_text.chars().take(1).collect();

            let alternatives = if merged_chars > 2 {
                let alt: String = merged_text
                    .chars()
                    .take(merged_chars - 1)
                    .collect();
                let alt_rank = merged_id + merged_chars as u32;
                vec![DiscardedAlternative {
                    token: alt,
                    rank: alt_rank,
                    reason: format!("outranked by full merge '{merged_text}'"),
                }]
            } else {
                Vec::new()
            };

            if let Some(alt) = alternatives.first() {
                tokens[i].path_logic.alternative_paths.push(alt.token.clone());
                tokens[i].path_logic.rank_conflicts.push(alt.rank);
            }

            merge_operations.push(MergeOperation {
                step,
                left: MergePart::new(left_text, left_id),
                right: MergePart::new(first_char, merged_id),
                merged: MergePart::new(merged_text, merged_id),
                alternatives,
            });
            step += 1;
        }

        Ok(WaterfallStage {
            level,
            tokens,
            merge_operations,
            processing_time_ms: ms_since(start),
            entropy: total_entropy,
        })
    }

    /// Heuristic confidence rule, not a probability.
    fn confidence_for(&self, clean: &str, id: u32, decision_type: DecisionType) -> f64 {
        if decision_type == DecisionType::Fallback {
            0.3
        } else if self.vocab.contains_key(clean) {
            0.95
        } else if id < 1000 {
            0.9
        } else {
            0.7
        }
    }

    /// Score merge stability for the final token sequence.
    ///
    /// A token competes only when its merge recorded a discarded
    /// alternative; the competitor's score decays with the rank gap.
    /// Fallback tokens are treated as contested by construction.
    fn score_stability(
        &self,
        tokens: &[TokenDecisionMetadata],
        merges: &[MergeOperation],
    ) -> Vec<StabilityMetrics> {
        let contested: HashMap<&str, u32> = merges
            .iter()
            .filter_map(|m| {
                m.alternatives
                    .first()
                    .map(|alt| (m.merged.token.as_str(), alt.rank - m.merged.rank))
            })
            .collect();

        tokens
            .iter()
            .map(|token| {
                let top = token.confidence;
                if token.decision_type == DecisionType::Fallback {
                    return StabilityMetrics::from_scores(&token.token, top, top * 0.8);
                }
                match contested.get(token.byte_range.original_text.as_str()) {
                    Some(rank_gap) => {
                        let second = top / (1.0 + f64::from(*rank_gap).sqrt());
                        StabilityMetrics::from_scores(
                            token.byte_range.original_text.clone(),
                            top,
                            second,
                        )
                    }
                    None => StabilityMetrics::uncontested(
                        token.byte_range.original_text.clone(),
                        top,
                    ),
                }
            })
            .collect()
    }
}

fn strip_merge_prefix(raw: &str) -> (String, bool) {
    for prefix in MERGE_PREFIXES {
        if let Some(stripped) = raw.strip_prefix(prefix) {
            return (stripped.to_string(), true);
        }
    }
    (raw.to_string(), false)
}

fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{HeuristicProvider, HeuristicTokenizer};
    use crate::token::StabilityLevel;

    async fn engine() -> DecisionCaptureEngine {
        DecisionCaptureEngine::initialize(&HeuristicProvider::new(), "test-model")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn waterfall_has_four_stages_in_order() {
        let result = engine().await.capture_decisions("hello world").await.unwrap();
        let levels: Vec<StageLevel> =
            result.waterfall.stages.iter().map(|s| s.level).collect();
        assert_eq!(
            levels,
            vec![
                StageLevel::Byte,
                StageLevel::Character,
                StageLevel::Subword,
                StageLevel::Fullword
            ]
        );
    }

    #[tokio::test]
    async fn hello_world_byte_and_char_counts() {
        let result = engine().await.capture_decisions("hello world").await.unwrap();
        let byte = result.waterfall.stage(StageLevel::Byte).unwrap();
        let character = result.waterfall.stage(StageLevel::Character).unwrap();
        assert_eq!(byte.tokens.len(), 11);
        assert_eq!(character.tokens.len(), 11);
    }

    #[tokio::test]
    async fn coarser_stages_never_produce_more_tokens() {
        let texts = ["hello world", "the query searches data", "zxqv mmmm", "a"];
        let engine = engine().await;
        for text in texts {
            let result = engine.capture_decisions(text).await.unwrap();
            let chars = result.waterfall.stage(StageLevel::Character).unwrap().tokens.len();
            let subwords = result.waterfall.stage(StageLevel::Subword).unwrap().tokens.len();
            let fullwords = result.waterfall.stage(StageLevel::Fullword).unwrap().tokens.len();
            assert!(subwords <= chars, "{text}: {subwords} > {chars}");
            assert!(fullwords <= chars);
        }
    }

    #[tokio::test]
    async fn compression_ratio_positive_for_nonempty_input() {
        let result = engine().await.capture_decisions("hello world").await.unwrap();
        assert!(result.waterfall.compression_ratio > 0.0);
    }

    #[tokio::test]
    async fn known_words_align_to_source_offsets() {
        let result = engine().await.capture_decisions("hello world").await.unwrap();
        let tokens = &result.token_decisions;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].byte_range.start, 0);
        assert_eq!(tokens[0].byte_range.original_text, "hello");
        assert_eq!(tokens[1].byte_range.start, 6);
        assert_eq!(tokens[1].byte_range.original_text, "world");
    }

    #[tokio::test]
    async fn emoji_produces_fallback_decision() {
        let result = engine().await.capture_decisions("hello 🎉").await.unwrap();
        assert!(result
            .token_decisions
            .iter()
            .any(|t| t.decision_type == DecisionType::Fallback));
    }

    #[tokio::test]
    async fn merge_steps_monotonically_increase() {
        let result = engine()
            .await
            .capture_decisions("the query searches tokenized data")
            .await
            .unwrap();
        let stage = result.waterfall.stage(StageLevel::Subword).unwrap();
        for (i, op) in stage.merge_operations.iter().enumerate() {
            assert_eq!(op.step, i);
        }
    }

    #[tokio::test]
    async fn merge_right_side_is_first_character() {
        let result = engine().await.capture_decisions("hello world").await.unwrap();
        let stage = result.waterfall.stage(StageLevel::Fullword).unwrap();
        let op = stage
            .merge_operations
            .iter()
            .find(|op| op.merged.token == "world")
            .unwrap();
        assert_eq!(op.right.token, "w");
        assert_eq!(op.left.token, "hello");
        assert_eq!(op.alternatives.len(), 1);
        assert_eq!(op.alternatives[0].token, "worl");
    }

    #[tokio::test]
    async fn stability_coefficients_in_unit_interval() {
        let result = engine()
            .await
            .capture_decisions("hello world 🎉 zxqv")
            .await
            .unwrap();
        assert_eq!(result.stability_metrics.len(), result.token_decisions.len());
        for metric in &result.stability_metrics {
            assert!(metric.coefficient >= 0.0 && metric.coefficient <= 1.0);
        }
    }

    #[tokio::test]
    async fn fallback_tokens_score_critical() {
        let result = engine().await.capture_decisions("🎉").await.unwrap();
        let metric = &result.stability_metrics[0];
        assert_eq!(metric.level, StabilityLevel::Critical);
    }

    #[tokio::test]
    async fn continuation_tokens_classified_as_merge() {
        let adapter = Arc::new(HeuristicTokenizer::word_level("test-model"));
        let engine = DecisionCaptureEngine::from_adapter(adapter);
        let result = engine.capture_decisions("helloworld").await.unwrap();
        assert!(result
            .token_decisions
            .iter()
            .any(|t| t.decision_type == DecisionType::Merge));
    }

    #[tokio::test]
    async fn path_indices_reassigned_to_final_order() {
        let result = engine()
            .await
            .capture_decisions("the data model searches")
            .await
            .unwrap();
        for (i, token) in result.token_decisions.iter().enumerate() {
            assert_eq!(token.path_logic.selected_path_index, i);
        }
    }

    #[tokio::test]
    async fn empty_input_yields_empty_waterfall() {
        let result = engine().await.capture_decisions("").await.unwrap();
        assert_eq!(result.waterfall.final_token_count, 0);
        assert_eq!(result.waterfall.compression_ratio, 0.0);
        assert!(result.token_decisions.is_empty());
    }

    #[tokio::test]
    async fn entropy_ratios_sum_to_one_in_subword_stage() {
        let result = engine().await.capture_decisions("hello world").await.unwrap();
        let stage = result.waterfall.stage(StageLevel::Subword).unwrap();
        let sum: f64 = stage
            .tokens
            .iter()
            .map(|t| t.semantic_entropy.entropy_ratio)
            .sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
