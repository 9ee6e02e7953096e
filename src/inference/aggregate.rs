//! Merge per-parameter predictions into one ranked list
//!
//! Rank `i` of the merged result joins the rank-`i` label of every parameter
//! (in parameter order) and scores it with the sum of their probabilities
//! divided by `k`.

use std::cmp::Ordering;

use super::{top_k, Classification, ClassificationSet};

const LABEL_SEPARATOR: &str = ", ";

/// Merge `sets` (one per parameter) into at most `k` ranked classifications.
///
/// Returns `None` when there are no parameters or nothing to rank (`k` of 0,
/// or a parameter with no labels). If some parameter has fewer than `k`
/// labels, `k` shrinks to the smallest label count.
pub fn aggregate(sets: Vec<ClassificationSet>, k: usize) -> Option<Vec<Classification>> {
    if sets.is_empty() {
        return None;
    }

    let k = sets.iter().map(Vec::len).min().unwrap_or(0).min(k);
    if k == 0 {
        return None;
    }

    let mut merged: Vec<Classification> = (0..k).map(|_| Classification::new("", 0.0)).collect();

    for set in sets {
        for (slot, candidate) in merged.iter_mut().zip(top_k(set, k)) {
            if !slot.label.is_empty() {
                slot.label.push_str(LABEL_SEPARATOR);
            }
            slot.label.push_str(&candidate.label);
            slot.probability += candidate.probability / k as f32;
        }
    }

    merged.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
    });
    Some(merged)
}
