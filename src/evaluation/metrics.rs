//! Classification quality metrics over held-out data.

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric values for one evaluated run. Metrics that are undefined for the
/// evaluated data (e.g. AUC with a single-class test set) stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub auc_roc: Option<f64>,
    pub log_loss: Option<f64>,
    pub n_samples: usize,
}

impl EvalReport {
    /// Compute all metrics from labels, hard predictions, and positive-class
    /// probabilities.
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_proba: &Array1<f64>,
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != y_proba.len() {
            return Err(PipelineError::LabelMismatch(format!(
                "{} labels vs {} predictions vs {} probabilities",
                y_true.len(),
                y_pred.len(),
                y_proba.len()
            )));
        }
        if y_true.is_empty() {
            return Err(PipelineError::LabelMismatch(
                "empty test partition".to_string(),
            ));
        }
        if let Some(bad) = y_true.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::LabelMismatch(format!(
                "test label {} is not binary",
                bad
            )));
        }

        let n = y_true.len() as f64;

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (*t - *p).abs() < 0.5)
            .count();
        let accuracy = Some(correct as f64 / n);

        let (tp, fp, fn_) = confusion_counts(y_true, y_pred);
        let precision = if tp + fp > 0 {
            Some(tp as f64 / (tp + fp) as f64)
        } else {
            None
        };
        let recall = if tp + fn_ > 0 {
            Some(tp as f64 / (tp + fn_) as f64)
        } else {
            None
        };
        let f1_score = match (precision, recall) {
            (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1_score,
            auc_roc: auc_roc(y_true, y_proba),
            log_loss: Some(log_loss(y_true, y_proba)),
            n_samples: y_true.len(),
        })
    }

    /// Flatten the defined metrics into a name → value map for the tracker.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        let entries = [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1_score", self.f1_score),
            ("auc_roc", self.auc_roc),
            ("log_loss", self.log_loss),
        ];
        for (name, value) in entries {
            if let Some(v) = value {
                map.insert(name.to_string(), v);
            }
        }
        map.insert("n_samples".to_string(), self.n_samples as f64);
        map
    }
}

fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    (tp, fp, fn_)
}

/// Rank-statistic AUC (Mann-Whitney U) with tie-averaged ranks. Undefined
/// when the test partition holds a single class.
fn auc_roc(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&v| v > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| {
        y_proba[a]
            .partial_cmp(&y_proba[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks across tied scores.
    let mut ranks = vec![0.0; y_true.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && y_proba[order[j + 1]] == y_proba[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

fn log_loss(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> f64 {
    const EPS: f64 = 1e-15;
    let total: f64 = y_true
        .iter()
        .zip(y_proba.iter())
        .map(|(&t, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    total / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let proba = array![0.9, 0.1, 0.8, 0.2];
        let report = EvalReport::compute(&y, &y.clone(), &proba).unwrap();

        assert_eq!(report.accuracy, Some(1.0));
        assert_eq!(report.precision, Some(1.0));
        assert_eq!(report.recall, Some(1.0));
        assert_eq!(report.auc_roc, Some(1.0));
    }

    #[test]
    fn test_auc_handles_ties() {
        let y = array![1.0, 0.0, 1.0, 0.0];
        let proba = array![0.5, 0.5, 0.5, 0.5];
        let report = EvalReport::compute(&y, &array![1.0, 1.0, 1.0, 1.0], &proba).unwrap();
        assert!((report.auc_roc.unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_auc_undefined_for_single_class() {
        let y = array![1.0, 1.0];
        let report = EvalReport::compute(&y, &y.clone(), &array![0.9, 0.8]).unwrap();
        assert_eq!(report.auc_roc, None);
    }

    #[test]
    fn test_length_mismatch_is_label_mismatch() {
        let err = EvalReport::compute(&array![1.0, 0.0], &array![1.0], &array![0.5]).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let y = array![0.0, 2.0];
        let err = EvalReport::compute(&y, &y.clone(), &array![0.5, 0.5]).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }

    #[test]
    fn test_log_loss_clamps_probabilities() {
        let y = array![1.0, 0.0];
        let report = EvalReport::compute(&y, &y.clone(), &array![1.0, 0.0]).unwrap();
        assert!(report.log_loss.unwrap().is_finite());
    }

    #[test]
    fn test_to_map_skips_undefined_metrics() {
        let y = array![1.0, 1.0];
        let report = EvalReport::compute(&y, &y.clone(), &array![0.9, 0.8]).unwrap();
        let map = report.to_map();
        assert!(map.contains_key("accuracy"));
        assert!(!map.contains_key("auc_roc"));
    }
}
