//! Per-token decision metadata captured during waterfall replay

use serde::{Deserialize, Serialize};

/// How the tokenizer arrived at a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Token carries a continuation prefix (subword merge)
    Merge,
    /// Single-character token
    Split,
    /// Byte-escape or unknown-marker token
    Fallback,
    /// Whole vocabulary entry matched directly
    Direct,
}

/// Where a token sits in the source text.
///
/// Offsets are byte offsets into the original input. Coverage is
/// best-effort: decoded token text is re-aligned by forward substring
/// search, which can drift when cleaned text recurs earlier in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
    pub byte_length: usize,
    pub char_length: usize,
    pub original_text: String,
}

impl ByteRange {
    pub fn new(start: usize, original_text: impl Into<String>) -> Self {
        let original_text = original_text.into();
        let byte_length = original_text.len();
        let char_length = original_text.chars().count();
        Self {
            start,
            end: start + byte_length,
            byte_length,
            char_length,
            original_text,
        }
    }

    /// Whether the given byte offset falls inside this range.
    pub fn covers(&self, byte_offset: usize) -> bool {
        byte_offset >= self.start && byte_offset < self.end
    }
}

/// Decision-path bookkeeping for one token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathLogic {
    /// Depth of the decomposition stage that produced the token
    pub depth: usize,
    /// How many vocabulary candidates were considered
    pub hit_count: usize,
    /// Ranks that competed for this position
    pub rank_conflicts: Vec<u32>,
    /// Index of the token in the final selected path
    pub selected_path_index: usize,
    /// Textual alternatives that were not taken
    pub alternative_paths: Vec<String>,
}

/// Estimated information content attributed to one token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticEntropy {
    /// Estimated bits carried by this token
    pub entropy_contribution: f64,
    /// Share of the stage's total entropy
    pub entropy_ratio: f64,
    /// Estimated corpus frequency (heuristic, not learned)
    pub frequency: f64,
    /// Inverse document frequency estimate
    pub idf: f64,
}

/// Everything captured about one tokenization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDecisionMetadata {
    pub token_id: u32,
    /// Decoded token text, possibly a vocabulary fragment marker
    pub token: String,
    pub path_logic: PathLogic,
    pub semantic_entropy: SemanticEntropy,
    pub byte_range: ByteRange,
    pub decision_type: DecisionType,
    /// Heuristic confidence in [0, 1]
    pub confidence: f64,
}

impl TokenDecisionMetadata {
    /// Whether this token is a byte-escape or unknown-marker fallback.
    pub fn is_fallback(&self) -> bool {
        self.decision_type == DecisionType::Fallback
    }
}

/// Byte-escape tokens follow the `<0xHH>` convention.
pub(crate) fn is_byte_escape(token: &str) -> bool {
    token.len() == 6 && token.starts_with("<0x") && token.ends_with('>')
}

/// Unknown-marker spellings used across tokenizer bindings.
pub(crate) fn is_unknown_marker(token: &str) -> bool {
    matches!(token, "<unk>" | "[UNK]" | "<|unk|>" | "\u{fffd}")
}
