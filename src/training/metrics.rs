//! Classification metrics computed on the held-out split

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Binary confusion matrix cell counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

/// Metrics for a trained binary classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub roc_auc: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub training_time_secs: f64,
    pub n_samples: usize,
    pub n_features: usize,
}

impl ModelMetrics {
    /// Compute all metrics from test-set labels, predictions, and
    /// positive-class probabilities. Undefined ratios (zero denominators)
    /// evaluate to 0.0.
    pub fn compute(y_true: &[usize], y_pred: &[usize], y_proba: &[f64]) -> Self {
        let n = y_true.len();
        let mut cm = ConfusionMatrix::default();

        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t, p) {
                (0, 0) => cm.true_negatives += 1,
                (0, _) => cm.false_positives += 1,
                (_, 0) => cm.false_negatives += 1,
                _ => cm.true_positives += 1,
            }
        }

        let accuracy = if n > 0 {
            (cm.true_positives + cm.true_negatives) as f64 / n as f64
        } else {
            0.0
        };

        let precision = ratio(cm.true_positives, cm.true_positives + cm.false_positives);
        let recall = ratio(cm.true_positives, cm.true_positives + cm.false_negatives);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
            roc_auc: roc_auc(y_true, y_proba),
            confusion_matrix: cm,
            training_time_secs: 0.0,
            n_samples: n,
            n_features: 0,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Area under the ROC curve via the rank-sum statistic, with average ranks
/// for tied probabilities. Degenerate single-class inputs return 0.0.
fn roc_auc(y_true: &[usize], y_proba: &[f64]) -> f64 {
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&t| t == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        y_proba[a]
            .partial_cmp(&y_proba[b])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && y_proba[order[j + 1]] == y_proba[order[i]] {
            j += 1;
        }
        // ranks are 1-based; ties share the average rank of their run
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&t, _)| t == 1)
        .map(|(_, &r)| r)
        .sum();

    (pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0) / (n_pos * n_neg) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y_true = vec![0, 1, 0, 1];
        let y_pred = vec![0, 1, 0, 1];
        let y_proba = vec![0.1, 0.9, 0.2, 0.8];

        let m = ModelMetrics::compute(&y_true, &y_pred, &y_proba);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.roc_auc, 1.0);
        assert_eq!(m.confusion_matrix.true_positives, 2);
        assert_eq!(m.confusion_matrix.true_negatives, 2);
    }

    #[test]
    fn test_all_wrong() {
        let y_true = vec![0, 1];
        let y_pred = vec![1, 0];
        let y_proba = vec![0.9, 0.1];

        let m = ModelMetrics::compute(&y_true, &y_pred, &y_proba);
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.roc_auc, 0.0);
        assert_eq!(m.confusion_matrix.false_positives, 1);
        assert_eq!(m.confusion_matrix.false_negatives, 1);
    }

    #[test]
    fn test_zero_division_guards() {
        // model never predicts positive
        let y_true = vec![0, 0, 1];
        let y_pred = vec![0, 0, 0];
        let y_proba = vec![0.1, 0.2, 0.3];

        let m = ModelMetrics::compute(&y_true, &y_pred, &y_proba);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
    }

    #[test]
    fn test_auc_with_ties() {
        let y_true = vec![0, 1, 0, 1];
        let y_proba = vec![0.5, 0.5, 0.5, 0.5];
        let m = ModelMetrics::compute(&y_true, &[0, 0, 0, 0], &y_proba);
        assert!((m.roc_auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_auc_is_zero() {
        let y_true = vec![1, 1];
        let m = ModelMetrics::compute(&y_true, &[1, 1], &[0.6, 0.7]);
        assert_eq!(m.roc_auc, 0.0);
        assert_eq!(m.accuracy, 1.0);
    }
}
