//! WordPiece subword splitting
//!
//! Greedy longest-prefix match against the vocabulary. Words longer than
//! `max_word_chars` become a single unknown token without any search; the
//! naive search is quadratic in word length.

use std::sync::Arc;

use tracing::trace;
use unicode_general_category::{get_general_category, GeneralCategory};

use super::vocab::Vocabulary;
use super::SubwordTokenizer;

#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocab: Arc<Vocabulary>,
    max_word_chars: usize,
    /// Prepended to every subword after the first one of a word.
    continuation_prefix: String,
    /// Prepended to every whitespace-delimited word before punctuation is
    /// split off (RoBERTa-style vocabularies use `Ġ`).
    word_prefix: Option<String>,
}

impl WordPieceTokenizer {
    pub fn new(vocab: Arc<Vocabulary>, max_word_chars: usize) -> Self {
        Self {
            vocab,
            max_word_chars,
            continuation_prefix: "##".to_string(),
            word_prefix: None,
        }
    }

    pub fn with_continuation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.continuation_prefix = prefix.into();
        self
    }

    pub fn with_word_prefix(mut self, prefix: Option<String>) -> Self {
        self.word_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Whitespace split, optional word prefix, then punctuation split.
    fn split_words(&self, text: &str) -> Vec<String> {
        let mut words = Vec::new();
        for raw in text.split_whitespace() {
            let word = match &self.word_prefix {
                Some(prefix) => format!("{prefix}{raw}"),
                None => raw.to_string(),
            };

            let mut current = String::new();
            for c in word.chars() {
                if is_punctuation(c) {
                    if !current.is_empty() {
                        words.push(std::mem::take(&mut current));
                    }
                    words.push(c.to_string());
                } else {
                    current.push(c);
                }
            }
            if !current.is_empty() {
                words.push(current);
            }
        }
        words
    }

    /// Split one word into subwords, or `None` when some remainder has no
    /// matching prefix in the vocabulary.
    fn split_word(&self, word: &str) -> Option<Vec<String>> {
        let chars: Vec<char> = word.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;
            while start < end {
                let body: String = chars[start..end].iter().collect();
                let candidate = if start > 0 {
                    format!("{}{}", self.continuation_prefix, body)
                } else {
                    body
                };
                if self.vocab.contains(&candidate) {
                    found = Some(candidate);
                    break;
                }
                end -= 1;
            }

            pieces.push(found?);
            start = end;
        }

        Some(pieces)
    }
}

impl SubwordTokenizer for WordPieceTokenizer {
    fn tokenize(&self, normalized: &str) -> Vec<String> {
        let mut output = Vec::new();
        for word in self.split_words(normalized) {
            if word.chars().count() > self.max_word_chars {
                trace!("Word of {} chars exceeds limit, emitting unknown", word.chars().count());
                output.push(self.vocab.unknown_token().to_string());
                continue;
            }
            match self.split_word(&word) {
                Some(pieces) => output.extend(pieces),
                None => output.push(self.vocab.unknown_token().to_string()),
            }
        }
        output
    }
}

/// ASCII punctuation (symbols such as `$`, `+` and `~` included) plus every
/// Unicode punctuation category.
pub(crate) fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            get_general_category(c),
            GeneralCategory::ConnectorPunctuation
                | GeneralCategory::DashPunctuation
                | GeneralCategory::OpenPunctuation
                | GeneralCategory::ClosePunctuation
                | GeneralCategory::InitialPunctuation
                | GeneralCategory::FinalPunctuation
                | GeneralCategory::OtherPunctuation
        )
}
