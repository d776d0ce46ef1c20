//! Character-level alignment across models
//!
//! One entry per source character, mapping each surviving model to the
//! token whose byte range covers that character. This is what makes
//! model outputs diffable position by position.

use super::SingleModelAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A token reference covering one character for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedToken {
    pub token: String,
    pub token_id: u32,
    pub start: usize,
    pub end: usize,
}

/// Per-character alignment entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterAlignment {
    /// Character index into the source text
    pub position: usize,
    pub character: char,
    /// Covering token per model; absent when no token covers the index
    pub tokens: HashMap<String, AlignedToken>,
}

/// Build the per-character alignment table.
pub(crate) fn build_character_alignment(
    text: &str,
    analyses: &[SingleModelAnalysis],
) -> Vec<CharacterAlignment> {
    text.char_indices()
        .enumerate()
        .map(|(position, (byte_offset, character))| {
            let mut tokens = HashMap::new();
            for analysis in analyses {
                let covering = analysis
                    .tokens
                    .iter()
                    .find(|t| t.byte_range.covers(byte_offset));
                if let Some(token) = covering {
                    tokens.insert(
                        analysis.model.clone(),
                        AlignedToken {
                            token: token.byte_range.original_text.clone(),
                            token_id: token.token_id,
                            start: token.byte_range.start,
                            end: token.byte_range.end,
                        },
                    );
                }
            }
            CharacterAlignment {
                position,
                character,
                tokens,
            }
        })
        .collect()
}
