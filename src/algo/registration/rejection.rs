//! Outlier rejection of point pairs.

use super::{PointPair, RejectionCriterion};

/// Median of `values`; the mean of the two middle values for even lengths.
/// `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    })
}

/// Remove outlier pairs.
///
/// - `KMedian`: keeps pairs with `distance <= k * median`, where the median is
///   taken over the same `pairs` being filtered.
/// - `DissimilarNormals`: keeps pairs with `1 - dot(n_p, n_q) <= threshold`.
/// - `None`: keeps everything.
pub fn reject_pairs(
    pairs: Vec<PointPair>,
    criterion: RejectionCriterion,
    k: f64,
    normal_threshold: f64,
) -> Vec<PointPair> {
    match criterion {
        RejectionCriterion::None => pairs,
        RejectionCriterion::KMedian => {
            let distances: Vec<f64> = pairs.iter().map(|p| p.distance).collect();
            let Some(median) = median(&distances) else {
                return pairs;
            };
            let limit = k * median;
            pairs.into_iter().filter(|p| p.distance <= limit).collect()
        }
        RejectionCriterion::DissimilarNormals => pairs
            .into_iter()
            .filter(|p| 1.0 - p.normal_agreement() <= normal_threshold)
            .collect(),
    }
}
