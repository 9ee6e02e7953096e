//! Seams to the numeric model

use std::path::Path;

use crate::error::Result;
use crate::tokenizer::EncodedSequence;

/// Everything the backend sees for one parameter.
#[derive(Debug, Clone, Copy)]
pub struct ModelInput<'a> {
    pub sequence: &'a EncodedSequence,
    /// Zero-based position of the parameter in the signature
    pub parameter_index: usize,
    /// 1 where a token belongs to this parameter's name, else 0. Same length
    /// as the sequence; all zeros when the parameter could not be located.
    pub parameter_mask: &'a [u32],
}

/// A loaded model that scores one encoded sequence.
///
/// Returns one raw score per label in label order. Errors are plain strings;
/// the caller attaches the parameter index.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: &ModelInput<'_>) -> std::result::Result<Vec<f32>, String>;

    /// Length of every successful `infer` output.
    fn label_count(&self) -> usize;
}

/// Builds a backend from a model artifact on disk.
pub trait BackendLoader: Send + Sync {
    fn load(&self, artifact: &Path) -> Result<Box<dyn InferenceBackend>>;
}
