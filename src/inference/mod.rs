//! Per-parameter classification and result merging
//!
//! The model itself is opaque: an [`InferenceBackend`] turns one encoded
//! sequence into one raw score per label. Everything around that call lives
//! here: label sets, softmax, local top-K and the multi-parameter merge.

pub mod aggregate;
pub mod backend;
pub mod linear;
pub mod signature;

pub use aggregate::aggregate;
pub use backend::{BackendLoader, InferenceBackend, ModelInput};
pub use linear::{LinearBackend, LinearLoader};
pub use signature::{parameter_masks, FunctionSignature};

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// One candidate type label with its probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub probability: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Classifications for one input, in label order until sorted.
pub type ClassificationSet = Vec<Classification>;

/// Pair each label with its probability, keeping label order.
pub fn classify(labels: &[String], probabilities: &[f32]) -> ClassificationSet {
    labels
        .iter()
        .zip(probabilities)
        .map(|(label, &p)| Classification::new(label.clone(), p))
        .collect()
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// The `k` most probable classifications, best first.
///
/// The sort is stable, so equal probabilities keep label order.
pub fn top_k(mut set: ClassificationSet, k: usize) -> ClassificationSet {
    set.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
    });
    set.truncate(k);
    set
}

/// Read the label set, one label per line. Blank lines are skipped.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::vocabulary(path, e))?;
    let labels: Vec<String> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    if labels.is_empty() {
        return Err(Error::vocabulary(path, "label set is empty"));
    }
    debug!("Loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_large_scores() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_empty() {
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_top_k_ties_keep_label_order() {
        let set = vec![
            Classification::new("str", 0.25),
            Classification::new("int", 0.5),
            Classification::new("bool", 0.25),
        ];
        let top = top_k(set, 3);
        let labels: Vec<_> = top.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["int", "str", "bool"]);
    }

    #[test]
    fn test_top_k_truncates() {
        let set = classify(
            &["a".into(), "b".into(), "c".into()],
            &[0.1, 0.7, 0.2],
        );
        let top = top_k(set, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label, "b");
        assert_eq!(top[1].label, "c");
    }

    #[test]
    fn test_load_labels_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "int\n\nstr\r\nList[int]\n").unwrap();
        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["int", "str", "List[int]"]);
    }

    #[test]
    fn test_load_labels_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(load_labels(&path), Err(Error::VocabularyLoad { .. })));
    }
}
