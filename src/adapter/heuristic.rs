//! Built-in heuristic tokenizer
//!
//! A small greedy longest-match tokenizer over a seeded vocabulary, with
//! `##` continuation pieces and an `<unk>` fallback. It exists so the
//! crate and its CLI are exercisable without an external binding; it is
//! not a faithful BPE implementation.

use super::tokenizer::{TokenizerAdapter, TokenizerError, TokenizerProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

const UNK_TOKEN: &str = "<unk>";
const UNK_ID: u32 = 0;

/// Seed words for the word-level vocabulary. Order fixes token ids.
const SEED_WORDS: &[&str] = &[
    "the", "of", "and", "to", "in", "is", "it", "you", "that", "he", "was", "for", "on", "are",
    "with", "as", "his", "they", "at", "be", "this", "have", "from", "or", "one", "had", "by",
    "word", "but", "not", "what", "all", "were", "we", "when", "your", "can", "said", "there",
    "use", "an", "each", "which", "she", "do", "how", "their", "if", "will", "up", "other",
    "about", "out", "many", "then", "them", "these", "so", "some", "her", "would", "make",
    "like", "him", "into", "time", "has", "look", "two", "more", "write", "go", "see", "number",
    "way", "could", "people", "my", "than", "first", "water", "been", "call", "who", "oil",
    "its", "now", "find", "long", "down", "day", "did", "get", "come", "made", "may", "part",
    "hello", "world", "query", "search", "model", "token", "data", "text", "code", "test",
    "ing", "ed", "er", "ly", "tion", "ment", "ness", "able",
];

/// Greedy longest-match tokenizer over a fixed vocabulary.
pub struct HeuristicTokenizer {
    name: String,
    vocab: Arc<HashMap<String, u32>>,
    reverse: HashMap<u32, String>,
    /// When set, only single-character pieces are matched
    char_level: bool,
}

impl HeuristicTokenizer {
    /// Word-level variant: seed words plus character fallback pieces.
    pub fn word_level(name: impl Into<String>) -> Self {
        Self::build(name.into(), true)
    }

    /// Character-level variant: every piece is a single character.
    ///
    /// Useful as a deliberately divergent model in comparisons.
    pub fn char_level(name: impl Into<String>) -> Self {
        Self::build(name.into(), false)
    }

    fn build(name: String, with_words: bool) -> Self {
        let mut vocab = HashMap::new();
        let mut reverse = HashMap::new();
        let mut next_id: u32 = UNK_ID;

        let mut insert = |vocab: &mut HashMap<String, u32>,
                          reverse: &mut HashMap<u32, String>,
                          token: String,
                          id: &mut u32| {
            if !vocab.contains_key(&token) {
                vocab.insert(token.clone(), *id);
                reverse.insert(*id, token);
                *id += 1;
            }
        };

        insert(&mut vocab, &mut reverse, UNK_TOKEN.to_string(), &mut next_id);

        // Printable ASCII as both word-initial and continuation pieces
        for c in ' '..='~' {
            if c == ' ' {
                continue;
            }
            insert(&mut vocab, &mut reverse, c.to_string(), &mut next_id);
            insert(&mut vocab, &mut reverse, format!("##{c}"), &mut next_id);
        }

        if with_words {
            for word in SEED_WORDS {
                insert(&mut vocab, &mut reverse, (*word).to_string(), &mut next_id);
                insert(&mut vocab, &mut reverse, format!("##{word}"), &mut next_id);
            }
        }

        Self {
            name,
            vocab: Arc::new(vocab),
            reverse,
            char_level: !with_words,
        }
    }

    /// Greedily split one whitespace-delimited word into vocabulary ids.
    fn encode_word(&self, word: &str, out: &mut Vec<u32>) {
        let chars: Vec<char> = word.chars().collect();
        let mut pos = 0;
        while pos < chars.len() {
            let max_len = if self.char_level { 1 } else { chars.len() - pos };
            let mut matched = None;
            for len in (1..=max_len).rev() {
                let piece: String = chars[pos..pos + len].iter().collect();
                let lookup = if pos == 0 { piece } else { format!("##{piece}") };
                if let Some(id) = self.vocab.get(&lookup) {
                    matched = Some((*id, len));
                    break;
                }
            }
            match matched {
                Some((id, len)) => {
                    out.push(id);
                    pos += len;
                }
                None => {
                    out.push(UNK_ID);
                    pos += 1;
                }
            }
        }
    }
}

#[async_trait]
impl TokenizerAdapter for HeuristicTokenizer {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let mut ids = Vec::new();
        for word in text.split_whitespace() {
            self.encode_word(word, &mut ids);
        }
        Ok(ids)
    }

    async fn decode_batch(&self, ids: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        let mut texts = Vec::with_capacity(ids.len());
        for group in ids {
            let mut text = String::new();
            for id in group {
                match self.reverse.get(id) {
                    Some(token) => text.push_str(token),
                    None => text.push_str(UNK_TOKEN),
                }
            }
            texts.push(text);
        }
        Ok(texts)
    }

    fn vocabulary(&self) -> Arc<HashMap<String, u32>> {
        Arc::clone(&self.vocab)
    }
}

/// Provider serving heuristic tokenizers by name.
///
/// Names ending in `-char` get the character-level variant. An optional
/// allowlist turns unknown names into load failures, which integration
/// tests use to exercise partial-comparison behavior.
pub struct HeuristicProvider {
    known_models: Option<Vec<String>>,
}

impl HeuristicProvider {
    pub fn new() -> Self {
        Self { known_models: None }
    }

    /// Restrict the provider to a fixed set of model names.
    pub fn with_known_models(models: Vec<String>) -> Self {
        Self {
            known_models: Some(models),
        }
    }
}

impl Default for HeuristicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenizerProvider for HeuristicProvider {
    async fn load(&self, model: &str) -> Result<Arc<dyn TokenizerAdapter>, TokenizerError> {
        if let Some(known) = &self.known_models {
            if !known.iter().any(|m| m == model) {
                return Err(TokenizerError::UnknownModel(model.to_string()));
            }
        }
        if model.is_empty() {
            return Err(TokenizerError::LoadFailed {
                model: model.to_string(),
                reason: "empty model name".to_string(),
            });
        }
        let adapter: Arc<dyn TokenizerAdapter> = if model.ends_with("-char") {
            Arc::new(HeuristicTokenizer::char_level(model))
        } else {
            Arc::new(HeuristicTokenizer::word_level(model))
        };
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_word_encodes_to_single_token() {
        let tok = HeuristicTokenizer::word_level("test");
        let ids = tok.encode("hello").await.unwrap();
        assert_eq!(ids.len(), 1);
        let texts = tok.decode_batch(&[ids]).await.unwrap();
        assert_eq!(texts[0], "hello");
    }

    #[tokio::test]
    async fn unknown_word_splits_into_pieces() {
        let tok = HeuristicTokenizer::word_level("test");
        let ids = tok.encode("zxqv").await.unwrap();
        assert!(ids.len() >= 2, "no seed word covers zxqv");
        let chars = "zxqv".chars().count();
        assert!(ids.len() <= chars);
    }

    #[tokio::test]
    async fn non_ascii_falls_back_to_unk() {
        let tok = HeuristicTokenizer::word_level("test");
        let ids = tok.encode("a🎉b").await.unwrap();
        assert!(ids.contains(&UNK_ID));
        // One token per char at most
        assert!(ids.len() <= 3);
    }

    #[tokio::test]
    async fn char_level_always_splits() {
        let tok = HeuristicTokenizer::char_level("test-char");
        let ids = tok.encode("hello").await.unwrap();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn provider_allowlist_rejects_unknown() {
        let provider = HeuristicProvider::with_known_models(vec!["good".to_string()]);
        assert!(provider.load("good").await.is_ok());
        assert!(provider.load("bad").await.is_err());
    }

    #[tokio::test]
    async fn continuation_pieces_carry_marker() {
        let tok = HeuristicTokenizer::word_level("test");
        let ids = tok.encode("helloworld").await.unwrap();
        let groups: Vec<Vec<u32>> = ids.iter().map(|id| vec![*id]).collect();
        let texts = tok.decode_batch(&groups).await.unwrap();
        assert_eq!(texts[0], "hello");
        assert!(texts[1].starts_with("##"));
    }
}
