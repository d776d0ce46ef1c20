//! Synthetic BPE-style merge operation records

use serde::{Deserialize, Serialize};

/// One side of a merge: a token with its merge rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePart {
    pub token: String,
    pub rank: u32,
}

impl MergePart {
    pub fn new(token: impl Into<String>, rank: u32) -> Self {
        Self {
            token: token.into(),
            rank,
        }
    }
}

/// A merge candidate that lost to the selected merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardedAlternative {
    pub token: String,
    pub rank: u32,
    /// Why the candidate lost
    pub reason: String,
}

/// A reconstructed merge step the tokenizer would have taken.
///
/// The replay cannot observe real merge order, so the right side is
/// approximated as the merged token's first character. Steps are ordered
/// by monotonically increasing `step` within a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOperation {
    pub step: usize,
    pub left: MergePart,
    pub right: MergePart,
    pub merged: MergePart,
    pub alternatives: Vec<DiscardedAlternative>,
}
