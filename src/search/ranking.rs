// Top-k selection and rescaling of similarity scores.
//
// Every score is needed for the rescaling denominator, so selection is a
// full stable sort rather than a partial one. Ties keep the original row
// order of the bundle arrays.

use std::cmp::Ordering;

/// A selected entity: its row in the bundle and its (possibly rescaled) score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub score: f64,
}

/// Indices of the `k` largest scores, in descending score order.
///
/// Returns `min(k, scores.len())` distinct indices. Equal scores keep their
/// original order; NaN sorts by IEEE total order (positive NaN first).
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| descending(scores[a], scores[b]));
    order.truncate(k);
    order
}

/// The divisor used when rescaling: the maximum over all scores, provided
/// at least one is positive. `None` means scores stay raw.
pub fn rescale_denominator(scores: &[f64]) -> Option<f64> {
    if scores.iter().any(|&s| s > 0.0) {
        Some(scores.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    } else {
        None
    }
}

/// Select the top `k` entities and optionally rescale their scores so the
/// corpus-wide best positive match is 1.0.
pub fn rank(scores: &[f64], k: usize, rescale: bool) -> Vec<Ranked> {
    let denominator = if rescale {
        rescale_denominator(scores)
    } else {
        None
    };
    top_k_indices(scores, k)
        .into_iter()
        .map(|index| Ranked {
            index,
            score: match denominator {
                Some(max) => scores[index] / max,
                None => scores[index],
            },
        })
        .collect()
}

fn descending(a: f64, b: f64) -> Ordering {
    // Adding 0.0 folds -0.0 into 0.0 so the two tie
    (b + 0.0).total_cmp(&(a + 0.0))
}
