//! Text cleaning applied before subword tokenization
//!
//! Steps run in a fixed order; each one feeds the next:
//! 1. drop NUL, U+FFFD and every "other" (C*) character except tab,
//!    newline and carriage return
//! 2. trim
//! 3. lowercase (optional)
//! 4. NFD
//! 5. drop nonspacing marks (Mn); spacing and enclosing marks stay
//! 6. trim
//! 7. collapse whitespace runs to one space

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::UnicodeNormalization;

/// Normalization pipeline. Pure and cheap to share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextNormalizer {
    lowercase: bool,
}

impl TextNormalizer {
    pub fn new(lowercase: bool) -> Self {
        Self { lowercase }
    }

    pub fn lowercase(&self) -> bool {
        self.lowercase
    }

    pub fn normalize(&self, raw: &str) -> String {
        let cleaned: String = raw.chars().filter(|&c| !is_removable(c)).collect();
        let trimmed = cleaned.trim();

        let cased = if self.lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        };

        let stripped: String = cased.nfd().filter(|&c| !is_nonspacing_mark(c)).collect();

        collapse_whitespace(stripped.trim())
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

/// NUL, the replacement character and anything in category C (control,
/// format, private use, unassigned) other than tab, newline and carriage
/// return.
fn is_removable(c: char) -> bool {
    match c {
        '\0' | '\u{FFFD}' => true,
        '\t' | '\n' | '\r' => false,
        _ => matches!(
            get_general_category(c),
            GeneralCategory::Control
                | GeneralCategory::Format
                | GeneralCategory::PrivateUse
                | GeneralCategory::Surrogate
                | GeneralCategory::Unassigned
        ),
    }
}

fn is_nonspacing_mark(c: char) -> bool {
    get_general_category(c) == GeneralCategory::NonspacingMark
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
