//! Bag-of-tokens linear classifier
//!
//! Pure Rust, no native runtime. Each label has a weight per vocabulary
//! index; a sequence scores as the mean weight of its real tokens, with
//! tokens of the current parameter's name weighted up by `parameter_focus`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{BackendLoader, InferenceBackend, ModelInput};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearBackend {
    /// Weights [label_count x vocab_size]
    weights: Vec<Vec<f32>>,
    /// Bias [label_count]
    bias: Vec<f32>,
    /// Extra weight for tokens covered by the parameter mask
    #[serde(default)]
    parameter_focus: f32,
}

impl LinearBackend {
    pub fn with_weights(weights: Vec<Vec<f32>>, bias: Vec<f32>, parameter_focus: f32) -> Self {
        Self {
            weights,
            bias,
            parameter_focus,
        }
    }

    /// Load from JSON. Bias and weight rows must agree on the label count.
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| Error::artifact(&artifact, e))?;
        let model: Self = serde_json::from_str(&content)
            .map_err(|e| Error::artifact(&artifact, format!("invalid model JSON: {e}")))?;

        if model.weights.len() != model.bias.len() {
            return Err(Error::artifact(
                &artifact,
                format!(
                    "{} weight rows but {} bias terms",
                    model.weights.len(),
                    model.bias.len()
                ),
            ));
        }
        debug!("Loaded linear model with {} labels", model.bias.len());
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

impl InferenceBackend for LinearBackend {
    fn infer(&self, input: &ModelInput<'_>) -> std::result::Result<Vec<f32>, String> {
        let seq = input.sequence;
        if input.parameter_mask.len() != seq.len() {
            return Err(format!(
                "mask length {} does not match sequence length {}",
                input.parameter_mask.len(),
                seq.len()
            ));
        }

        // an empty sequence scores as bias alone
        let norm = seq.valid_length.max(1) as f32;
        let logits = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, &bias)| {
                let mut sum = 0.0f32;
                for pos in 0..seq.valid_length {
                    let weight = row.get(seq.token_ids[pos] as usize).copied().unwrap_or(0.0);
                    let focus = 1.0 + self.parameter_focus * input.parameter_mask[pos] as f32;
                    sum += weight * focus;
                }
                bias + sum / norm
            })
            .collect();
        Ok(logits)
    }

    fn label_count(&self) -> usize {
        self.bias.len()
    }
}

/// Loads [`LinearBackend`] artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearLoader;

impl BackendLoader for LinearLoader {
    fn load(&self, artifact: &Path) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new(LinearBackend::load(artifact)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EncodedSequence;

    fn sequence(ids: &[u32]) -> EncodedSequence {
        EncodedSequence {
            tokens: ids.iter().map(|i| i.to_string()).collect(),
            token_ids: ids.to_vec(),
            type_ids: vec![0; ids.len()],
            attention_mask: vec![1; ids.len()],
            valid_length: ids.len(),
        }
    }

    #[test]
    fn test_mean_weight_plus_bias() {
        let model = LinearBackend::with_weights(
            vec![vec![1.0, 0.0, 3.0], vec![0.0, 2.0, 0.0]],
            vec![0.5, 0.0],
            0.0,
        );
        let seq = sequence(&[0, 2]);
        let mask = vec![0, 0];
        let input = ModelInput {
            sequence: &seq,
            parameter_index: 0,
            parameter_mask: &mask,
        };
        let logits = model.infer(&input).unwrap();
        assert_eq!(logits, vec![2.5, 0.0]);
    }

    #[test]
    fn test_parameter_mask_changes_scores() {
        let model = LinearBackend::with_weights(vec![vec![1.0, 1.0]], vec![0.0], 1.0);
        let seq = sequence(&[0, 1]);
        let plain = vec![0, 0];
        let focused = vec![0, 1];
        let a = model
            .infer(&ModelInput {
                sequence: &seq,
                parameter_index: 0,
                parameter_mask: &plain,
            })
            .unwrap();
        let b = model
            .infer(&ModelInput {
                sequence: &seq,
                parameter_index: 0,
                parameter_mask: &focused,
            })
            .unwrap();
        assert_eq!(a, vec![1.0]);
        assert_eq!(b, vec![1.5]);
    }

    #[test]
    fn test_padding_ignored() {
        let model = LinearBackend::with_weights(vec![vec![2.0, 100.0]], vec![0.0], 0.0);
        let mut seq = sequence(&[0]);
        seq.pad_to(4, "<pad>", 1);
        let mask = vec![0; 4];
        let logits = model
            .infer(&ModelInput {
                sequence: &seq,
                parameter_index: 0,
                parameter_mask: &mask,
            })
            .unwrap();
        assert_eq!(logits, vec![2.0]);
    }

    #[test]
    fn test_empty_sequence_scores_bias() {
        let model = LinearBackend::with_weights(vec![vec![1.0]], vec![0.25], 0.0);
        let seq = EncodedSequence::default();
        let input = ModelInput {
            sequence: &seq,
            parameter_index: 0,
            parameter_mask: &[],
        };
        assert_eq!(model.infer(&input).unwrap(), vec![0.25]);
    }

    #[test]
    fn test_mask_length_mismatch_is_error() {
        let model = LinearBackend::with_weights(vec![vec![1.0]], vec![0.0], 0.0);
        let seq = sequence(&[0, 0]);
        let input = ModelInput {
            sequence: &seq,
            parameter_index: 0,
            parameter_mask: &[0],
        };
        assert!(model.infer(&input).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = LinearBackend::with_weights(vec![vec![0.1, 0.2]], vec![0.3], 0.5);
        model.save(&path).unwrap();
        let loaded = LinearLoader.load(&path).unwrap();
        assert_eq!(loaded.label_count(), 1);
    }

    #[test]
    fn test_load_rejects_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"weights": [[1.0]], "bias": [0.0, 1.0]}"#).unwrap();
        assert!(matches!(
            LinearBackend::load(&path),
            Err(Error::ArtifactUnavailable { .. })
        ));
    }
}
