//! Binary classification metrics for validator accuracy.
//!
//! `approved` is the positive class; `rejected` and `flagged` are negative.

use serde::{Deserialize, Serialize};

use super::consensus::round4;
use super::evaluation::Recommendation;

/// Maximum number of ground-truth-resolved evaluations in the rolling window.
pub const METRICS_WINDOW: i64 = 100;

/// Precision, recall and F1, each rounded to four decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub sample_size: usize,
}

impl AccuracyMetrics {
    /// Compute metrics from `(validator recommendation, ground truth)` pairs.
    /// Returns `None` for an empty window.
    pub fn compute(pairs: &[(Recommendation, Recommendation)]) -> Option<Self> {
        if pairs.is_empty() {
            return None;
        }

        let (mut tp, mut fp, mut fn_) = (0u32, 0u32, 0u32);
        for (predicted, truth) in pairs {
            match (predicted.is_positive(), truth.is_positive()) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }

        let precision = if tp + fp > 0 { f64::from(tp) / f64::from(tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0 { f64::from(tp) / f64::from(tp + fn_) } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Some(Self {
            precision: round4(precision),
            recall: round4(recall),
            f1_score: round4(f1),
            sample_size: pairs.len(),
        })
    }
}

/// Correctness is an exact match between recommendation and ground truth:
/// `flagged` against a `rejected` truth is not correct.
pub fn is_exact_match(recommendation: Recommendation, ground_truth: Recommendation) -> bool {
    recommendation.as_str() == ground_truth.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use Recommendation::{Approved, Flagged, Rejected};

    #[test]
    fn test_all_correct_is_perfect() {
        let mut pairs = vec![(Approved, Approved); 6];
        pairs.extend(vec![(Rejected, Rejected); 4]);
        let m = AccuracyMetrics::compute(&pairs).unwrap();
        assert_eq!(format!("{:.4}", m.f1_score), "1.0000");
        assert_eq!(format!("{:.4}", m.precision), "1.0000");
        assert_eq!(format!("{:.4}", m.recall), "1.0000");
    }

    #[test]
    fn test_mixed_confusion_matrix() {
        let mut pairs = vec![(Approved, Approved); 5];
        pairs.extend(vec![(Approved, Rejected); 2]);
        pairs.extend(vec![(Rejected, Approved); 3]);
        let m = AccuracyMetrics::compute(&pairs).unwrap();
        assert_eq!(m.precision, 0.7143);
        assert_eq!(m.recall, 0.625);
        assert_eq!(m.f1_score, 0.6667);
    }

    #[test]
    fn test_no_positives_is_zero() {
        let m = AccuracyMetrics::compute(&[(Rejected, Rejected), (Flagged, Rejected)]).unwrap();
        assert_eq!(m.f1_score, 0.0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
    }

    #[test]
    fn test_empty_window_is_none() {
        assert!(AccuracyMetrics::compute(&[]).is_none());
    }

    #[test]
    fn test_flagged_vs_rejected_not_exact() {
        assert!(!is_exact_match(Flagged, Rejected));
        assert!(is_exact_match(Rejected, Rejected));
    }

    fn any_rec() -> impl Strategy<Value = Recommendation> {
        prop_oneof![Just(Approved), Just(Rejected), Just(Flagged)]
    }

    proptest! {
        #[test]
        fn prop_f1_bounded_and_harmonic(pairs in prop::collection::vec((any_rec(), any_rec()), 1..100)) {
            let m = AccuracyMetrics::compute(&pairs).unwrap();
            prop_assert!((0.0..=1.0).contains(&m.f1_score));
            prop_assert!((0.0..=1.0).contains(&m.precision));
            prop_assert!((0.0..=1.0).contains(&m.recall));
            if m.precision + m.recall == 0.0 {
                prop_assert_eq!(m.f1_score, 0.0);
            } else {
                let expected = 2.0 * m.precision * m.recall / (m.precision + m.recall);
                prop_assert!((m.f1_score - expected).abs() < 1e-3);
            }
        }
    }
}
