//! Byte-pair-merge subword splitting
//!
//! Text is pre-split with the GPT-2 piece pattern, each piece is turned into
//! initial symbols (UTF-8 bytes through the GPT-2 byte→unicode table, or
//! plain code points), and adjacent pairs are fused by ascending merge rank
//! until no known pair remains.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::SubwordTokenizer;
use crate::error::{Error, Result};

/// GPT-2 pre-tokenization pattern. `\s+(?!\S)` needs lookahead, hence
/// `fancy_regex` rather than `regex`.
const PIECE_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Glyph the byte-level table assigns to the space byte.
pub const SPACE_MARKER: char = 'Ġ';

/// Initial symbol granularity for the merge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// UTF-8 bytes mapped through the GPT-2 byte→unicode table
    #[default]
    Bytes,
    /// Unicode code points; the space is mapped to `Ġ`
    Chars,
}

/// Ordered pair → rank table. Lower rank merges first.
#[derive(Debug, Clone, Default)]
pub struct MergeTable {
    ranks: HashMap<(String, String), u32>,
}

impl MergeTable {
    /// Parse `merges.txt`: one `left right` pair per line, rank = position.
    /// `#version` headers and blank lines are skipped.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut ranks = HashMap::new();
        let mut rank = 0u32;
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with("#version") {
                continue;
            }
            let mut parts = line.split(' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(left), Some(right), None) if !left.is_empty() && !right.is_empty() => {
                    ranks
                        .entry((left.to_string(), right.to_string()))
                        .or_insert(rank);
                    rank += 1;
                }
                _ => return Err(format!("malformed merge on line {}: {:?}", line_no + 1, line)),
            }
        }
        Ok(Self { ranks })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::vocabulary(path, e))?;
        let table = Self::parse(&content).map_err(|e| Error::vocabulary(path, e))?;
        debug!("Loaded {} merges from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks
            .get(&(left.to_owned(), right.to_owned()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, S)> for MergeTable {
    fn from_iter<I: IntoIterator<Item = (S, S)>>(iter: I) -> Self {
        let mut ranks = HashMap::new();
        for (rank, (left, right)) in iter.into_iter().enumerate() {
            ranks.entry((left.into(), right.into())).or_insert(rank as u32);
        }
        Self { ranks }
    }
}

#[derive(Debug, Clone)]
pub struct BpeTokenizer {
    merges: Arc<MergeTable>,
    granularity: Granularity,
}

impl BpeTokenizer {
    pub fn new(merges: Arc<MergeTable>, granularity: Granularity) -> Self {
        Self {
            merges,
            granularity,
        }
    }

    /// Split text into pre-tokenization pieces. A regex engine failure
    /// (backtrack limit) keeps the unmatched remainder as one piece.
    fn pieces<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut pieces = Vec::new();
        let mut consumed = 0;
        for found in piece_regex().find_iter(text) {
            match found {
                Ok(m) => {
                    if !m.as_str().is_empty() {
                        pieces.push(m.as_str());
                    }
                    consumed = m.end();
                }
                Err(e) => {
                    warn!("Piece split failed at byte {}: {}", consumed, e);
                    if consumed < text.len() {
                        pieces.push(&text[consumed..]);
                    }
                    break;
                }
            }
        }
        pieces
    }

    fn initial_symbols(&self, piece: &str) -> Vec<String> {
        match self.granularity {
            Granularity::Bytes => {
                let table = byte_encoder();
                piece
                    .bytes()
                    .map(|b| table[b as usize].to_string())
                    .collect()
            }
            Granularity::Chars => piece
                .chars()
                .map(|c| if c == ' ' { SPACE_MARKER } else { c }.to_string())
                .collect(),
        }
    }

    /// Run the merge loop on one piece's symbols.
    fn merge(&self, mut word: Vec<String>) -> Vec<String> {
        while word.len() > 1 {
            let best = word
                .windows(2)
                .filter_map(|pair| {
                    self.merges
                        .rank(&pair[0], &pair[1])
                        .map(|rank| (rank, pair[0].clone(), pair[1].clone()))
                })
                .min_by_key(|(rank, _, _)| *rank);

            let Some((_, first, second)) = best else {
                break;
            };

            // Fuse every occurrence of the winning pair, left to right.
            let mut merged = Vec::with_capacity(word.len());
            let mut i = 0;
            while i < word.len() {
                if i + 1 < word.len() && word[i] == first && word[i + 1] == second {
                    merged.push(format!("{first}{second}"));
                    i += 2;
                } else {
                    merged.push(std::mem::take(&mut word[i]));
                    i += 1;
                }
            }
            word = merged;
        }
        word
    }
}

impl SubwordTokenizer for BpeTokenizer {
    fn tokenize(&self, normalized: &str) -> Vec<String> {
        self.pieces(normalized)
            .into_iter()
            .flat_map(|piece| self.merge(self.initial_symbols(piece)))
            .collect()
    }
}

fn piece_regex() -> &'static Regex {
    static PIECES: OnceLock<Regex> = OnceLock::new();
    PIECES.get_or_init(|| Regex::new(PIECE_PATTERN).expect("piece pattern is valid"))
}

/// GPT-2 reversible byte→unicode table: printable bytes map to themselves,
/// the rest are shifted past U+0100 so no byte becomes whitespace or a
/// control character.
pub fn byte_encoder() -> &'static [char; 256] {
    static TABLE: OnceLock<[char; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = ['\0'; 256];
        let mut shifted = 0u32;
        for b in 0..=255u8 {
            let printable = matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF);
            let code = if printable {
                b as u32
            } else {
                shifted += 1;
                255 + shifted
            };
            table[b as usize] = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
        }
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(merges: &[(&str, &str)], granularity: Granularity) -> BpeTokenizer {
        let table: MergeTable = merges.iter().copied().collect();
        BpeTokenizer::new(Arc::new(table), granularity)
    }

    #[test]
    fn test_byte_encoder_space_is_marker() {
        assert_eq!(byte_encoder()[b' ' as usize], SPACE_MARKER);
        assert_eq!(byte_encoder()[b'a' as usize], 'a');
        assert_eq!(byte_encoder()[b'\n' as usize], 'Ċ');
    }

    #[test]
    fn test_byte_encoder_is_injective() {
        let mut seen: Vec<char> = byte_encoder().to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn test_merges_by_rank() {
        let t = tokenizer(&[("d", "e"), ("de", "f")], Granularity::Bytes);
        assert_eq!(t.tokenize("def"), vec!["def"]);
    }

    #[test]
    fn test_lower_rank_wins() {
        // "b c" outranks "a b", so "abc" becomes a + bc
        let t = tokenizer(&[("b", "c"), ("a", "b")], Granularity::Bytes);
        assert_eq!(t.tokenize("abc"), vec!["a", "bc"]);
    }

    #[test]
    fn test_leading_space_gets_marker() {
        let t = tokenizer(&[("Ġ", "x")], Granularity::Bytes);
        assert_eq!(t.tokenize("def x"), vec!["d", "e", "f", "Ġx"]);
    }

    #[test]
    fn test_all_occurrences_fused() {
        let t = tokenizer(&[("a", "a")], Granularity::Chars);
        assert_eq!(t.tokenize("aaaa"), vec!["aa", "aa"]);
    }

    #[test]
    fn test_char_granularity_keeps_code_points() {
        let t = tokenizer(&[], Granularity::Chars);
        assert_eq!(t.tokenize("é"), vec!["é"]);
        let b = tokenizer(&[], Granularity::Bytes);
        assert_eq!(b.tokenize("é").len(), 2);
    }

    #[test]
    fn test_pieces_split_punctuation_and_contractions() {
        let t = tokenizer(&[], Granularity::Chars);
        assert_eq!(t.pieces("f(x) it's"), vec!["f", "(", "x", ")", " it", "'s"]);
    }

    #[test]
    fn test_empty_text() {
        let t = tokenizer(&[("a", "b")], Granularity::Bytes);
        assert!(t.tokenize("").is_empty());
    }

    #[test]
    fn test_parse_merges_skips_header() {
        let table = MergeTable::parse("#version: 0.2\nĠ t\nh e\n\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rank("Ġ", "t"), Some(0));
        assert_eq!(table.rank("h", "e"), Some(1));
    }

    #[test]
    fn test_parse_merges_rejects_malformed() {
        assert!(MergeTable::parse("a b c").is_err());
        assert!(MergeTable::parse("single").is_err());
    }
}
