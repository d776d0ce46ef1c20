//! Byte and character stage reconstruction
//!
//! The two lowest waterfall stages never touch the real tokenizer: bytes
//! are replayed at maximum entropy and characters are scored from a
//! small class-based table.

use crate::token::{
    ByteRange, DecisionType, PathLogic, SemanticEntropy, StageLevel, TokenDecisionMetadata,
    WaterfallStage,
};

/// Bits per raw byte under the maximum-entropy assumption (log2 256).
pub const BYTE_ENTROPY: f64 = 8.0;

/// Estimated bits for a character by class.
pub fn char_class_entropy(c: char) -> f64 {
    if is_cjk(c) {
        13.0
    } else if c.is_ascii_alphabetic() {
        4.7
    } else if c.is_ascii_digit() {
        3.3
    } else {
        6.0
    }
}

/// Class-based corpus frequency estimate. Not learned; a coarse prior.
pub fn char_class_frequency(c: char) -> f64 {
    if is_cjk(c) {
        0.002
    } else if c.is_ascii_alphabetic() {
        0.04
    } else if c.is_ascii_digit() {
        0.02
    } else {
        0.005
    }
}

fn is_cjk(c: char) -> bool {
    matches!(u32::from(c),
        0x4E00..=0x9FFF      // CJK Unified Ideographs
        | 0x3400..=0x4DBF    // Extension A
        | 0x3040..=0x30FF    // Hiragana + Katakana
        | 0xAC00..=0xD7AF    // Hangul syllables
    )
}

/// One token per UTF-8 byte, fixed 8-bit entropy each.
pub fn byte_stage(text: &str, elapsed_ms: f64) -> WaterfallStage {
    let byte_count = text.len();
    let mut tokens = Vec::with_capacity(byte_count);
    for (i, b) in text.bytes().enumerate() {
        let escape = format!("<0x{b:02X}>");
        tokens.push(TokenDecisionMetadata {
            token_id: u32::from(b),
            token: escape.clone(),
            path_logic: PathLogic {
                depth: StageLevel::Byte.depth(),
                hit_count: 1,
                selected_path_index: i,
                ..PathLogic::default()
            },
            semantic_entropy: SemanticEntropy {
                entropy_contribution: BYTE_ENTROPY,
                entropy_ratio: if byte_count > 0 { 1.0 / byte_count as f64 } else { 0.0 },
                frequency: 1.0 / 256.0,
                idf: 256.0_f64.ln(),
            },
            byte_range: ByteRange {
                start: i,
                end: i + 1,
                byte_length: 1,
                char_length: 1,
                original_text: escape,
            },
            decision_type: DecisionType::Fallback,
            confidence: 0.3,
        });
    }
    let entropy = BYTE_ENTROPY * byte_count as f64;
    WaterfallStage {
        level: StageLevel::Byte,
        tokens,
        merge_operations: Vec::new(),
        processing_time_ms: elapsed_ms,
        entropy,
    }
}

/// One token per Unicode code point, entropy and frequency by class.
pub fn character_stage(text: &str, elapsed_ms: f64) -> WaterfallStage {
    let mut tokens = Vec::new();
    let mut total_entropy = 0.0;
    for (i, (byte_offset, c)) in text.char_indices().enumerate() {
        let contribution = char_class_entropy(c);
        total_entropy += contribution;
        let codepoint = u32::from(c);
        tokens.push(TokenDecisionMetadata {
            token_id: codepoint,
            token: c.to_string(),
            path_logic: PathLogic {
                depth: StageLevel::Character.depth(),
                hit_count: 1,
                selected_path_index: i,
                ..PathLogic::default()
            },
            semantic_entropy: SemanticEntropy {
                entropy_contribution: contribution,
                entropy_ratio: 0.0, // filled once the stage total is known
                frequency: char_class_frequency(c),
                idf: (1.0 / char_class_frequency(c)).ln(),
            },
            byte_range: ByteRange::new(byte_offset, c.to_string()),
            decision_type: DecisionType::Split,
            confidence: if codepoint < 1000 { 0.9 } else { 0.7 },
        });
    }
    for token in &mut tokens {
        token.semantic_entropy.entropy_ratio = if total_entropy > 0.0 {
            token.semantic_entropy.entropy_contribution / total_entropy
        } else {
            0.0
        };
    }
    WaterfallStage {
        level: StageLevel::Character,
        tokens,
        merge_operations: Vec::new(),
        processing_time_ms: elapsed_ms,
        entropy: total_entropy,
    }
}
