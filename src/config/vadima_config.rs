//! `vadima.toml` support
//!
//! Loaded from the first of:
//! - the `--config` path
//! - `./vadima.toml`
//! - `<config dir>/vadima/config.toml`
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! `VADIMA_MODEL_DIR` and `VADIMA_ARTIFACT_SOURCE` override the file.
//!
//! ```toml
//! [model]
//! dir = "~/.cache/vadima"
//! artifact = "model.json"
//! vocabulary = "vocab.txt"
//! labels = "labels.txt"
//!
//! [tokenizer]
//! strategy = "wordpiece"
//! lowercase = true
//!
//! [inference]
//! top_k = 5
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::tokenizer::{Granularity, SpecialTokens, Strategy};

pub const CONFIG_FILE_NAME: &str = "vadima.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VadimaConfig {
    pub model: ModelConfig,
    pub tokenizer: TokenizerConfig,
    pub inference: InferenceConfig,
}

/// Where the model and its resources live.
///
/// Relative file names resolve against `dir`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model directory (default: `<cache dir>/vadima`)
    pub dir: Option<PathBuf>,
    /// Model artifact file name
    pub artifact: String,
    /// Directory the artifact is copied from when missing
    pub source: Option<PathBuf>,
    /// Vocabulary file (`.txt` one token per line, or `.json`)
    pub vocabulary: String,
    /// BPE merges file, required for the `bpe` strategy
    pub merges: Option<String>,
    /// Label set, one label per line
    pub labels: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: None,
            artifact: "model.json".to_string(),
            source: None,
            vocabulary: "vocab.txt".to_string(),
            merges: None,
            labels: "labels.txt".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn model_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_model_dir)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.model_dir().join(&self.artifact)
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.model_dir().join(&self.vocabulary)
    }

    pub fn merges_path(&self) -> Option<PathBuf> {
        self.merges.as_ref().map(|m| self.model_dir().join(m))
    }

    pub fn labels_path(&self) -> PathBuf {
        self.model_dir().join(&self.labels)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub strategy: Strategy,
    pub lowercase: bool,
    /// Longer words become a single unknown token
    pub max_word_chars: usize,
    pub continuation_prefix: String,
    /// Prefix added to every whitespace word before WordPiece splitting
    pub word_prefix: Option<String>,
    /// Initial BPE symbols: `bytes` or `chars`
    pub granularity: Granularity,
    pub unknown_token: String,
    pub sequence_start: String,
    pub sequence_end: String,
    pub pad_token: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        let special = SpecialTokens::default();
        Self {
            strategy: Strategy::default(),
            lowercase: true,
            max_word_chars: 200,
            continuation_prefix: "##".to_string(),
            word_prefix: None,
            granularity: Granularity::default(),
            unknown_token: "[UNK]".to_string(),
            sequence_start: special.sequence_start,
            sequence_end: special.sequence_end,
            pad_token: special.pad,
        }
    }
}

impl TokenizerConfig {
    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens {
            sequence_start: self.sequence_start.clone(),
            sequence_end: self.sequence_end.clone(),
            pad: self.pad_token.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Maximum sequence length the model accepts, special tokens included
    pub context_limit: usize,
    /// Source text is cut to this many characters before tokenizing
    pub max_source_chars: usize,
    pub top_k: usize,
    /// Pad every sequence to `context_limit` before inference
    pub pad_to_context: bool,
    pub cache_predictions: bool,
    /// Most predictions kept in the cache; older entries are evicted
    pub cache_capacity: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            context_limit: 512,
            max_source_chars: 510,
            top_k: 5,
            pad_to_context: true,
            cache_predictions: true,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

impl VadimaConfig {
    /// Check numeric bounds and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let inf = &self.inference;
        if inf.top_k == 0 {
            return Err(Error::Config("inference.top_k must be at least 1".into()));
        }
        if inf.cache_predictions && inf.cache_capacity == 0 {
            return Err(Error::Config(
                "inference.cache_capacity must be at least 1 when caching is on".into(),
            ));
        }
        if inf.context_limit < 3 {
            return Err(Error::Config(
                "inference.context_limit must leave room for one token".into(),
            ));
        }
        if inf.max_source_chars + 2 > inf.context_limit {
            return Err(Error::Config(format!(
                "inference.max_source_chars ({}) + 2 exceeds context_limit ({})",
                inf.max_source_chars, inf.context_limit
            )));
        }
        if self.tokenizer.max_word_chars == 0 {
            return Err(Error::Config(
                "tokenizer.max_word_chars must be at least 1".into(),
            ));
        }
        if self.tokenizer.strategy == Strategy::Bpe && self.model.merges.is_none() {
            return Err(Error::Config(
                "tokenizer.strategy = \"bpe\" needs model.merges".into(),
            ));
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// `<cache dir>/vadima`, or `.vadima` when no cache dir is known.
pub fn default_model_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("vadima"))
        .unwrap_or_else(|| PathBuf::from(".vadima"))
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vadima").join("config.toml"))
}

/// Load, apply environment overrides and validate.
///
/// An explicit path must exist and parse. Implicit locations that fail to
/// parse are skipped with a warning.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<VadimaConfig> {
    let mut config = match explicit {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config = VadimaConfig::from_toml(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            debug!("Loaded config from {}", path.display());
            config
        }
        None => load_implicit(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config.validate()?;
    Ok(config)
}

fn load_implicit() -> VadimaConfig {
    let candidates = std::iter::once(PathBuf::from(CONFIG_FILE_NAME)).chain(user_config_path());
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|c| VadimaConfig::from_toml(&c))
        {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
            }
        }
    }

    debug!("No config found, using defaults");
    VadimaConfig::default()
}

/// Environment variables override everything. `lookup` is `std::env::var`
/// outside of tests.
pub fn apply_env_overrides<F>(config: &mut VadimaConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("VADIMA_MODEL_DIR").filter(|v| !v.is_empty()) {
        config.model.dir = Some(PathBuf::from(dir));
    }
    if let Some(source) = lookup("VADIMA_ARTIFACT_SOURCE").filter(|v| !v.is_empty()) {
        config.model.source = Some(PathBuf::from(source));
    }
}

pub const EXAMPLE_CONFIG: &str = r###"# vadima configuration

[model]
# Directory holding the model artifact, vocabulary and labels
# dir = "/path/to/model"
# artifact = "model.json"
# vocabulary = "vocab.txt"      # or vocab.json
# merges = "merges.txt"         # needed for strategy = "bpe"
# labels = "labels.txt"
# Copy the artifact from here when it is missing
# source = "/mnt/models/vadima"

[tokenizer]
# strategy = "wordpiece"        # or "bpe"
# lowercase = true
# max_word_chars = 200
# continuation_prefix = "##"
# word_prefix = "Ġ"
# granularity = "bytes"         # bpe only: "bytes" or "chars"
# unknown_token = "[UNK]"
# sequence_start = "<s>"
# sequence_end = "</s>"
# pad_token = "<pad>"

[inference]
# context_limit = 512
# max_source_chars = 510
# top_k = 5
# pad_to_context = true
# cache_predictions = true
# cache_capacity = 1024         # cached predictions kept per model
"###;
