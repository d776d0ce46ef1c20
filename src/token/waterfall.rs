//! The 4-stage tokenization waterfall

use super::merge::MergeOperation;
use super::metadata::TokenDecisionMetadata;
use serde::{Deserialize, Serialize};

/// Granularity level of one waterfall stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageLevel {
    Byte,
    Character,
    Subword,
    Fullword,
}

impl StageLevel {
    /// Depth of the stage within the waterfall (bytes are deepest).
    pub fn depth(self) -> usize {
        match self {
            StageLevel::Byte => 0,
            StageLevel::Character => 1,
            StageLevel::Subword => 2,
            StageLevel::Fullword => 3,
        }
    }
}

/// One decomposition stage: its tokens, synthesized merges and entropy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallStage {
    pub level: StageLevel,
    pub tokens: Vec<TokenDecisionMetadata>,
    pub merge_operations: Vec<MergeOperation>,
    pub processing_time_ms: f64,
    /// Sum of per-token entropy contributions (bits)
    pub entropy: f64,
}

/// The full bytes -> characters -> subwords -> fullwords decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicWaterfallData {
    pub input: String,
    /// Stages in coarsening order: byte, character, subword, fullword
    pub stages: Vec<WaterfallStage>,
    pub total_time_ms: f64,
    /// Token count of the final (fullword) stage
    pub final_token_count: usize,
    /// Input character count / final token count
    pub compression_ratio: f64,
}

impl LogicWaterfallData {
    /// Find a stage by level.
    pub fn stage(&self, level: StageLevel) -> Option<&WaterfallStage> {
        self.stages.iter().find(|s| s.level == level)
    }
}
