//! Token sequence → model input indices

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::{TokenPipeline, Vocabulary};

/// Model-ready form of one source text.
///
/// `token_ids`, `type_ids` and `attention_mask` always have the same
/// length. Only the first `valid_length` positions are real tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EncodedSequence {
    pub tokens: Vec<String>,
    pub token_ids: Vec<u32>,
    pub type_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub valid_length: usize,
}

impl EncodedSequence {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Right-pad to `length` with `pad_id`, attention 0. No-op if already at
    /// least that long.
    pub fn pad_to(&mut self, length: usize, pad_token: &str, pad_id: u32) {
        while self.token_ids.len() < length {
            self.tokens.push(pad_token.to_string());
            self.token_ids.push(pad_id);
            self.type_ids.push(0);
            self.attention_mask.push(0);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Encoder {
    vocab: Arc<Vocabulary>,
    pipeline: Arc<TokenPipeline>,
    max_source_chars: usize,
    context_limit: usize,
}

impl Encoder {
    pub fn new(
        vocab: Arc<Vocabulary>,
        pipeline: Arc<TokenPipeline>,
        max_source_chars: usize,
        context_limit: usize,
    ) -> Self {
        Self {
            vocab,
            pipeline,
            max_source_chars,
            context_limit,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn pipeline(&self) -> &TokenPipeline {
        &self.pipeline
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    /// Map tokens to indices. Unknown tokens get the unknown index.
    pub fn encode(&self, tokens: Vec<String>) -> EncodedSequence {
        let token_ids: Vec<u32> = tokens.iter().map(|t| self.vocab.index(t)).collect();
        let len = token_ids.len();
        EncodedSequence {
            tokens,
            token_ids,
            type_ids: vec![0; len],
            attention_mask: vec![1; len],
            valid_length: len,
        }
    }

    /// Truncate, tokenize and encode raw source text.
    ///
    /// The text is cut to `max_source_chars` characters before
    /// normalization. When byte-level splitting still overflows the context,
    /// the character budget shrinks by the overflow and the shorter prefix is
    /// tokenized again; the token sequence itself is never cut.
    pub fn encode_text(&self, raw: &str) -> EncodedSequence {
        let mut budget = self.max_source_chars;
        loop {
            let source = truncate_chars(raw, budget);
            let tokens = self.pipeline.tokenize(source);
            if tokens.len() <= self.context_limit || budget == 0 {
                return self.encode(tokens);
            }
            let overflow = tokens.len() - self.context_limit;
            debug!(
                "{} tokens exceed context of {}, retrying with {} chars",
                tokens.len(),
                self.context_limit,
                budget.saturating_sub(overflow)
            );
            budget = budget.saturating_sub(overflow);
        }
    }

    /// Index of the pad token (unknown index if the vocabulary lacks it).
    pub fn pad_id(&self) -> u32 {
        self.vocab.index(&self.pipeline.special().pad)
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{
        BpeTokenizer, Granularity, MergeTable, SpecialTokens, TextNormalizer, WordPieceTokenizer,
    };

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_tokens(
            ["<pad>", "[UNK]", "<s>", "</s>", "foo", "##baz", "bar"],
            "[UNK]",
        ))
    }

    fn encoder(max_chars: usize, context: usize) -> Encoder {
        let vocab = vocab();
        let pipeline = TokenPipeline::new(
            TextNormalizer::default(),
            Box::new(WordPieceTokenizer::new(vocab.clone(), 200)),
            SpecialTokens::default(),
        );
        Encoder::new(vocab, Arc::new(pipeline), max_chars, context)
    }

    #[test]
    fn test_encode_text_layout() {
        let seq = encoder(510, 512).encode_text("foobaz bar");
        assert_eq!(seq.tokens, vec!["</s>", "foo", "##baz", "bar", "<s>"]);
        assert_eq!(seq.token_ids, vec![3, 4, 5, 6, 2]);
        assert_eq!(seq.type_ids, vec![0; 5]);
        assert_eq!(seq.attention_mask, vec![1; 5]);
        assert_eq!(seq.valid_length, 5);
    }

    #[test]
    fn test_unknown_tokens_map_to_unknown_index() {
        let seq = encoder(510, 512).encode_text("qux");
        assert_eq!(seq.token_ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_empty_source_encodes_empty() {
        let seq = encoder(510, 512).encode_text("   ");
        assert!(seq.is_empty());
        assert_eq!(seq.valid_length, 0);
    }

    #[test]
    fn test_truncates_before_normalization() {
        let seq = encoder(3, 512).encode_text("foobaz");
        assert_eq!(seq.tokens, vec!["</s>", "foo", "<s>"]);
    }

    #[test]
    fn test_pad_to() {
        let enc = encoder(510, 512);
        let mut seq = enc.encode_text("bar");
        seq.pad_to(6, "<pad>", enc.pad_id());
        assert_eq!(seq.token_ids, vec![3, 6, 2, 0, 0, 0]);
        assert_eq!(seq.attention_mask, vec![1, 1, 1, 0, 0, 0]);
        assert_eq!(seq.type_ids.len(), 6);
        assert_eq!(seq.valid_length, 3);
    }

    #[test]
    fn test_bpe_overflow_shrinks_budget() {
        let vocab = Arc::new(Vocabulary::from_tokens(["<unk>"], "<unk>"));
        let pipeline = TokenPipeline::new(
            TextNormalizer::new(false),
            Box::new(BpeTokenizer::new(
                Arc::new(MergeTable::default()),
                Granularity::Bytes,
            )),
            SpecialTokens::default(),
        );
        // each CJK char is three byte-level symbols: 4 chars need 14 tokens
        let enc = Encoder::new(vocab, Arc::new(pipeline), 4, 11);
        let seq = enc.encode_text("中中中中");
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.tokens.first().map(String::as_str), Some("</s>"));
        assert_eq!(seq.tokens.last().map(String::as_str), Some("<s>"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
