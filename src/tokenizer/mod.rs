//! Source text → model tokens
//!
//! Two interchangeable subword strategies sit behind [`SubwordTokenizer`]:
//! - [`WordPieceTokenizer`] (greedy longest-prefix match)
//! - [`BpeTokenizer`] (ranked pair merges)
//!
//! [`TokenPipeline`] runs the normalizer, the chosen strategy and the
//! special-token rule; [`Encoder`] maps the result onto vocabulary indices.

pub mod bpe;
pub mod encoder;
pub mod normalizer;
pub mod vocab;
pub mod wordpiece;

pub use bpe::{BpeTokenizer, Granularity, MergeTable};
pub use encoder::{EncodedSequence, Encoder};
pub use normalizer::TextNormalizer;
pub use vocab::Vocabulary;
pub use wordpiece::WordPieceTokenizer;

use serde::{Deserialize, Serialize};

/// A subword splitting strategy over already normalized text.
///
/// Implementations never fail: anything they cannot split degrades to the
/// unknown token.
pub trait SubwordTokenizer: Send + Sync {
    fn tokenize(&self, normalized: &str) -> Vec<String>;
}

/// Which subword strategy a model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Wordpiece,
    Bpe,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Wordpiece => write!(f, "wordpiece"),
            Strategy::Bpe => write!(f, "bpe"),
        }
    }
}

/// Sequence delimiters wrapped around every non-empty token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialTokens {
    pub sequence_start: String,
    pub sequence_end: String,
    pub pad: String,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            sequence_start: "<s>".to_string(),
            sequence_end: "</s>".to_string(),
            pad: "<pad>".to_string(),
        }
    }
}

/// Wrap `tokens` as `[end, tokens.., start]`.
///
/// The end marker comes first and the start marker last; trained models
/// depend on this order. Empty input stays empty.
pub fn with_special_tokens(mut tokens: Vec<String>, special: &SpecialTokens) -> Vec<String> {
    if tokens.is_empty() {
        return tokens;
    }
    tokens.insert(0, special.sequence_end.clone());
    tokens.push(special.sequence_start.clone());
    tokens
}

/// Normalizer + subword strategy + special tokens.
pub struct TokenPipeline {
    normalizer: TextNormalizer,
    strategy: Box<dyn SubwordTokenizer>,
    special: SpecialTokens,
}

impl TokenPipeline {
    pub fn new(
        normalizer: TextNormalizer,
        strategy: Box<dyn SubwordTokenizer>,
        special: SpecialTokens,
    ) -> Self {
        Self {
            normalizer,
            strategy,
            special,
        }
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn special(&self) -> &SpecialTokens {
        &self.special
    }

    /// Subword tokens of `raw`, without special tokens.
    pub fn subwords(&self, raw: &str) -> Vec<String> {
        let normalized = self.normalizer.normalize(raw);
        if normalized.is_empty() {
            return Vec::new();
        }
        self.strategy.tokenize(&normalized)
    }

    /// Full token sequence for `raw`, special tokens included.
    pub fn tokenize(&self, raw: &str) -> Vec<String> {
        with_special_tokens(self.subwords(raw), &self.special)
    }
}

impl std::fmt::Debug for TokenPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPipeline")
            .field("normalizer", &self.normalizer)
            .field("special", &self.special)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pipeline() -> TokenPipeline {
        let vocab = Arc::new(Vocabulary::from_tokens(
            ["[UNK]", "def", "f", "(", "x", ")", ":"],
            "[UNK]",
        ));
        TokenPipeline::new(
            TextNormalizer::default(),
            Box::new(WordPieceTokenizer::new(vocab, 200)),
            SpecialTokens::default(),
        )
    }

    #[test]
    fn test_special_tokens_reversed_order() {
        let tokens = with_special_tokens(vec!["a".into(), "b".into()], &SpecialTokens::default());
        assert_eq!(tokens, vec!["</s>", "a", "b", "<s>"]);
    }

    #[test]
    fn test_special_tokens_skip_empty() {
        assert!(with_special_tokens(Vec::new(), &SpecialTokens::default()).is_empty());
    }

    #[test]
    fn test_pipeline_normalizes_first() {
        assert_eq!(
            pipeline().tokenize("  DEF   f(x):  "),
            vec!["</s>", "def", "f", "(", "x", ")", ":", "<s>"]
        );
    }

    #[test]
    fn test_pipeline_blank_input() {
        assert!(pipeline().tokenize(" \u{0} \n").is_empty());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(Strategy::Bpe.to_string(), "bpe");
        assert_eq!(Strategy::default(), Strategy::Wordpiece);
    }
}
