//! Function header parsing and parameter position masks
//!
//! Only the `def name(...)` header is inspected; the body stays opaque text.

use std::sync::OnceLock;

use regex::Regex;

use crate::tokenizer::{bpe::SPACE_MARKER, EncodedSequence, TextNormalizer};

/// Name and parameter names of a function header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<String>,
}

impl FunctionSignature {
    /// Parse the first `def name(...)` header in `source`.
    ///
    /// Annotations, defaults and `*`/`**` prefixes are dropped; bare `*` and
    /// `/` separators are not parameters. Returns `None` when no header is
    /// found or its parentheses never close.
    pub fn parse(source: &str) -> Option<Self> {
        let caps = def_regex().captures(source)?;
        let name = caps.get(1)?.as_str().to_string();
        let open = caps.get(0)?.end();
        let inner = balanced_arguments(&source[open..])?;

        let parameters = split_top_level(inner)
            .into_iter()
            .filter_map(parameter_name)
            .collect();

        Some(Self { name, parameters })
    }
}

fn def_regex() -> &'static Regex {
    static DEF: OnceLock<Regex> = OnceLock::new();
    DEF.get_or_init(|| Regex::new(r"\bdef\s+(\w+)\s*\(").expect("def pattern is valid"))
}

/// Text up to the `)` that closes the already consumed `(`.
fn balanced_arguments(rest: &str) -> Option<&str> {
    let mut depth = 1usize;
    for (idx, c) in rest.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..idx]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in args.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&args[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

fn parameter_name(raw: &str) -> Option<String> {
    let head = raw.split([':', '=']).next().unwrap_or("");
    let name = head.trim().trim_start_matches('*').trim();
    if name.is_empty() || name == "/" {
        return None;
    }
    Some(name.to_string())
}

/// One mask per parameter over `sequence`: 1 on the token run that spells
/// the parameter name, 0 elsewhere (padding included).
///
/// Runs are matched left to right from a moving cursor, so repeated
/// spellings resolve to successive occurrences. A parameter that cannot be
/// found gets an all-zero mask. Returns `None` when the header does not list
/// exactly `parameter_count` parameters.
pub fn parameter_masks(
    signature: &FunctionSignature,
    sequence: &EncodedSequence,
    normalizer: &TextNormalizer,
    continuation_prefix: &str,
    parameter_count: usize,
) -> Option<Vec<Vec<u32>>> {
    if signature.parameters.len() != parameter_count {
        return None;
    }

    let surfaces: Vec<String> = sequence.tokens[..sequence.valid_length]
        .iter()
        .map(|t| surface(t, continuation_prefix))
        .collect();

    // skip the function name itself
    let mut cursor = find_run(&surfaces, &normalizer.normalize(&signature.name), 0)
        .map(|(_, end)| end)
        .unwrap_or(0);

    let masks = signature
        .parameters
        .iter()
        .map(|param| {
            let mut mask = vec![0u32; sequence.len()];
            if let Some((start, end)) = find_run(&surfaces, &normalizer.normalize(param), cursor) {
                mask[start..end].fill(1);
                cursor = end;
            }
            mask
        })
        .collect();
    Some(masks)
}

/// Token text with subword markers removed.
fn surface(token: &str, continuation_prefix: &str) -> String {
    let token = if continuation_prefix.is_empty() {
        token
    } else {
        token.strip_prefix(continuation_prefix).unwrap_or(token)
    };
    token.trim_start_matches(SPACE_MARKER).to_string()
}

/// First `[start, end)` at or after `from` whose concatenated surfaces equal
/// `target`.
fn find_run(surfaces: &[String], target: &str, from: usize) -> Option<(usize, usize)> {
    if target.is_empty() {
        return None;
    }
    for start in from..surfaces.len() {
        let mut joined = String::new();
        for (end, piece) in surfaces.iter().enumerate().skip(start) {
            joined.push_str(piece);
            if joined == target {
                return Some((start, end + 1));
            }
            if !target.starts_with(joined.as_str()) {
                break;
            }
        }
    }
    None
}
