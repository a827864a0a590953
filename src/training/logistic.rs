//! L2-regularized logistic regression fitted by full-batch gradient descent.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Vec<f64>>,
    pub intercept: Option<f64>,
    /// L2 regularization strength.
    pub l2: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm.
    pub tol: f64,
    /// Seed for weight initialization.
    pub seed: u64,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            l2: 0.01,
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
            seed: 42,
            is_fitted: false,
        }
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
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

        // Small symmetric init from the seeded RNG keeps runs reproducible.
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut weights =
            Array1::from_shape_fn(n_features, |_| rng.gen_range(-0.01..0.01));
        let mut bias = 0.0;

        let lr = self.learning_rate;
        let l2 = self.l2;

        for iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = Self::sigmoid(&linear);

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + l2 * &weights;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !grad_norm.is_finite() {
                return Err(PipelineError::TrainingDiverged(format!(
                    "non-finite gradient at iteration {}",
                    iter
                )));
            }
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(PipelineError::TrainingDiverged(
                "non-finite weights after fitting".to_string(),
            ));
        }

        self.coefficients = Some(weights.to_vec());
        self.intercept = Some(bias);
        self.is_fitted = true;
        Ok(())
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let weights = Array1::from_vec(coefficients.clone());
        let intercept = self.intercept.unwrap_or(0.0);
        let linear = x.dot(&weights) + intercept;
        Ok(Self::sigmoid(&linear))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(|c| c.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.2],
            [0.0, 0.3],
            [5.0, 5.1],
            [5.2, 4.9],
            [4.8, 5.0],
            [5.1, 5.3],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_fit_separates_classes() {
        let (x, y) = separable_data();
        let mut model = LogisticRegression::new().with_max_iter(2000);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_fit_is_deterministic_under_seed() {
        let (x, y) = separable_data();
        let mut a = LogisticRegression::new().with_seed(7);
        let mut b = LogisticRegression::new().with_seed(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.coefficients, b.coefficients);
        assert_eq!(a.intercept, b.intercept);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let model = LogisticRegression::new();
        let err = model.predict(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFitted));
    }

    #[test]
    fn test_diverging_learning_rate_is_reported() {
        let (x, y) = separable_data();
        let mut model = LogisticRegression::new()
            .with_learning_rate(1e160)
            .with_max_iter(50);
        let result = model.fit(&x, &y);
        assert!(matches!(result, Err(PipelineError::TrainingDiverged(_))));
    }

    #[test]
    fn test_feature_count_mismatch_is_shape_error() {
        let (x, y) = separable_data();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        let err = model.predict(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));
    }
}
