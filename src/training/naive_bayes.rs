//! Multinomial naive Bayes over non-negative term counts.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialNaiveBayes {
    /// Log prior per class, indexed [negative, positive].
    class_log_prior: Option<[f64; 2]>,
    /// Per-class log feature probabilities, indexed [negative, positive].
    feature_log_prob: Option<[Vec<f64>; 2]>,
    /// Laplace smoothing.
    pub smoothing: f64,
}

impl MultinomialNaiveBayes {
    pub fn new(smoothing: f64) -> Self {
        Self {
            class_log_prior: None,
            feature_log_prob: None,
            smoothing: smoothing.max(f64::MIN_POSITIVE),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.class_log_prior.is_some()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut class_counts = [0usize; 2];
        for &label in y.iter() {
            class_counts[(label >= 0.5) as usize] += 1;
        }

        let mut log_prior = [0.0; 2];
        let mut log_prob: [Vec<f64>; 2] = [Vec::new(), Vec::new()];

        for class in 0..2 {
            log_prior[class] = (class_counts[class] as f64 / n_samples as f64).ln();

            let mut feature_counts = vec![self.smoothing; n_features];
            let mut total = self.smoothing * n_features as f64;
            for (row, &label) in x.rows().into_iter().zip(y.iter()) {
                if (label >= 0.5) as usize == class {
                    for (j, &value) in row.iter().enumerate() {
                        let value = value.max(0.0);
                        feature_counts[j] += value;
                        total += value;
                    }
                }
            }

            log_prob[class] = feature_counts
                .iter()
                .map(|&count| (count / total).ln())
                .collect();
        }

        self.class_log_prior = Some(log_prior);
        self.feature_log_prob = Some(log_prob);
        Ok(())
    }

    /// Joint log score per class for each row.
    fn joint_log_likelihood(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let log_prior = self.class_log_prior.ok_or(PipelineError::ModelNotFitted)?;
        let log_prob = self
            .feature_log_prob
            .as_ref()
            .ok_or(PipelineError::ModelNotFitted)?;

        if x.ncols() != log_prob[0].len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", log_prob[0].len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut scores = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            for class in 0..2 {
                let log_likelihood: f64 = row
                    .iter()
                    .zip(log_prob[class].iter())
                    .map(|(&count, &lp)| count * lp)
                    .sum();
                scores[[i, class]] = log_prior[class] + log_likelihood;
            }
        }
        Ok(scores)
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.joint_log_likelihood(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                // Log-sum-exp normalization of the two class scores.
                let max = row[0].max(row[1]);
                let denom = (row[0] - max).exp() + (row[1] - max).exp();
                (row[1] - max).exp() / denom
            })
            .collect())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.joint_log_likelihood(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| if row[1] > row[0] { 1.0 } else { 0.0 })
            .collect())
    }

    pub fn n_features(&self) -> Option<usize> {
        self.feature_log_prob.as_ref().map(|p| p[0].len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn count_data() -> (Array2<f64>, Array1<f64>) {
        // Columns: ["free", "offer", "meeting", "notes"].
        let x = array![
            [3.0, 2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0, 1.0],
            [4.0, 3.0, 1.0, 0.0],
            [0.0, 0.0, 2.0, 3.0],
            [0.0, 1.0, 3.0, 2.0],
            [1.0, 0.0, 2.0, 4.0],
        ];
        let y = array![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        (x, y)
    }

    #[test]
    fn test_fit_predict_recovers_classes() {
        let (x, y) = count_data();
        let mut model = MultinomialNaiveBayes::new(1.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_proba_is_bounded() {
        let (x, y) = count_data();
        let mut model = MultinomialNaiveBayes::new(1.0);
        model.fit(&x, &y).unwrap();
        for p in model.predict_proba(&x).unwrap().iter() {
            assert!(*p >= 0.0 && *p <= 1.0);
        }
    }

    #[test]
    fn test_unfitted_model_errors() {
        let model = MultinomialNaiveBayes::new(1.0);
        let err = model.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFitted));
    }

    #[test]
    fn test_serde_round_trip() {
        let (x, y) = count_data();
        let mut model = MultinomialNaiveBayes::new(0.5);
        model.fit(&x, &y).unwrap();

        let reloaded: MultinomialNaiveBayes =
            serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
        assert_eq!(reloaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }
}
