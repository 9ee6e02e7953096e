//! Token vocabulary
//!
//! Ordered, bidirectional mapping between subword tokens and indices.
//! Two on-disk formats are accepted:
//! - line-oriented `vocab.txt` (line number = index, BERT style)
//! - key-value `vocab.json` (`{"token": index}`, GPT-2 style)

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Immutable token ⇄ index table with an unknown-token fallback.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    unknown_id: u32,
}

impl Vocabulary {
    /// Build from tokens in index order.
    ///
    /// A duplicate keeps the index of its first occurrence; later copies
    /// still occupy their line so that indices stay aligned with the file.
    /// The unknown token is appended when the list does not contain it.
    pub fn from_tokens<I, S>(tokens: I, unknown: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut id_to_token: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut token_to_id = HashMap::with_capacity(id_to_token.len());
        for (idx, token) in id_to_token.iter().enumerate() {
            token_to_id.entry(token.clone()).or_insert(idx as u32);
        }

        let unknown_id = match token_to_id.get(unknown) {
            Some(&id) => id,
            None => {
                let id = id_to_token.len() as u32;
                debug!("Unknown token {:?} missing from vocabulary, appended at {}", unknown, id);
                id_to_token.push(unknown.to_string());
                token_to_id.insert(unknown.to_string(), id);
                id
            }
        };

        Self {
            token_to_id,
            id_to_token,
            unknown_id,
        }
    }

    /// Parse line-oriented vocabulary text. Trailing `\r` is stripped so
    /// files written on Windows load identically.
    pub fn from_lines(text: &str, unknown: &str) -> Self {
        Self::from_tokens(text.lines().map(|l| l.trim_end_matches('\r')), unknown)
    }

    /// Parse a `{"token": index}` JSON object.
    ///
    /// Indices must be unique and dense (`0..len`), otherwise positions in
    /// the model's embedding table could not be reconstructed.
    pub fn from_json(text: &str, unknown: &str) -> std::result::Result<Self, String> {
        let map: HashMap<String, u32> =
            serde_json::from_str(text).map_err(|e| format!("invalid vocabulary JSON: {e}"))?;

        let mut ordered: Vec<Option<String>> = vec![None; map.len()];
        for (token, id) in map {
            let slot = ordered
                .get_mut(id as usize)
                .ok_or_else(|| format!("index {id} out of range for {token:?}"))?;
            if slot.is_some() {
                return Err(format!("index {id} assigned twice"));
            }
            *slot = Some(token);
        }

        let tokens: Vec<String> = ordered.into_iter().flatten().collect();
        Ok(Self::from_tokens(tokens, unknown))
    }

    /// Load from disk, choosing the format by file extension.
    pub fn load(path: &Path, unknown: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::vocabulary(path, e))?;

        let vocab = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json(&content, unknown).map_err(|e| Error::vocabulary(path, e))?
        } else {
            Self::from_lines(&content, unknown)
        };

        if vocab.len() <= 1 {
            return Err(Error::vocabulary(path, "vocabulary is empty"));
        }

        debug!("Loaded vocabulary from {} ({} tokens)", path.display(), vocab.len());
        Ok(vocab)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Index of `token`, or the unknown index.
    pub fn index(&self, token: &str) -> u32 {
        self.token_to_id
            .get(token)
            .copied()
            .unwrap_or(self.unknown_id)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    pub fn unknown_id(&self) -> u32 {
        self.unknown_id
    }

    pub fn unknown_token(&self) -> &str {
        &self.id_to_token[self.unknown_id as usize]
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }
}
