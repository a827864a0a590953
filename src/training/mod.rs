//! Model building stage.
//!
//! Fits a classifier on the engineered train features and persists the
//! fitted model as its own artifact. Training is deterministic under the
//! configured seed.

mod logistic;
mod naive_bayes;

pub use logistic::LogisticRegression;
pub use naive_bayes::MultinomialNaiveBayes;

use crate::artifact::{write_atomic, ArtifactLayout, ArtifactRef};
use crate::error::{PipelineError, Result};
use crate::features::FeatureSet;
use crate::params::{ModelKind, Params, TrainParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Tagged model artifact; new algorithms are added as variants without
/// touching the serving path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Classifier {
    Logistic(LogisticRegression),
    NaiveBayes(MultinomialNaiveBayes),
}

impl Classifier {
    pub fn from_params(params: &TrainParams) -> Self {
        match params.model {
            ModelKind::Logistic => Self::Logistic(
                LogisticRegression::new()
                    .with_l2(params.l2)
                    .with_learning_rate(params.learning_rate)
                    .with_max_iter(params.max_iter)
                    .with_seed(params.seed),
            ),
            ModelKind::NaiveBayes => Self::NaiveBayes(MultinomialNaiveBayes::new(params.smoothing)),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Self::Logistic(m) => m.fit(x, y),
            Self::NaiveBayes(m) => m.fit(x, y),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Self::Logistic(m) => m.predict(x),
            Self::NaiveBayes(m) => m.predict(x),
        }
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Self::Logistic(m) => m.predict_proba(x),
            Self::NaiveBayes(m) => m.predict_proba(x),
        }
    }

    /// Input width the fitted model expects.
    pub fn n_features(&self) -> Option<usize> {
        match self {
            Self::Logistic(m) => m.n_features(),
            Self::NaiveBayes(m) => m.n_features(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<ArtifactRef> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::ArtifactLoad(format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::ArtifactLoad(format!("{}: {}", path.display(), e))
        })
    }
}

/// Artifact and summary produced by the model building stage.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model: ArtifactRef,
    pub n_rows: usize,
    pub n_features: usize,
    pub train_accuracy: f64,
}

pub fn run(params: &Params) -> Result<TrainOutput> {
    let layout = ArtifactLayout::new(&params.artifacts_dir);
    ArtifactRef::require(&layout.train_features(), "featurize")?;

    let set = FeatureSet::load(&layout.train_features())?;
    let x = set.matrix()?;
    let y = set.labels_array();

    if x.nrows() < params.train.min_rows {
        return Err(PipelineError::InsufficientData {
            required: params.train.min_rows,
            actual: x.nrows(),
        });
    }

    let positives = y.iter().filter(|&&v| v >= 0.5).count();
    if positives == 0 || positives == y.len() {
        return Err(PipelineError::LabelMismatch(
            "train partition contains a single label class; need both 0 and 1".to_string(),
        ));
    }

    let mut model = Classifier::from_params(&params.train);
    model.fit(&x, &y)?;

    let predictions = model.predict(&x)?;
    let correct = predictions
        .iter()
        .zip(y.iter())
        .filter(|(p, t)| (*p - *t).abs() < 0.5)
        .count();
    let train_accuracy = correct as f64 / y.len() as f64;

    let model_ref = model.save(&layout.model())?;

    info!(
        rows = x.nrows(),
        features = x.ncols(),
        train_accuracy,
        "Model building complete"
    );

    Ok(TrainOutput {
        model: model_ref,
        n_rows: x.nrows(),
        n_features: x.ncols(),
        train_accuracy,
    })
}
