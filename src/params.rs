//! Run-wide parameter store.
//!
//! A single YAML document with one section per stage. Loaded once per run and
//! passed by reference to every stage call; never mutated mid-run. Unknown
//! keys are ignored, missing required keys fail with a config error before
//! any stage side effect.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Row handling when a record cannot be coerced to the expected schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    /// Fail the stage on the first uncoercible row.
    Error,
    /// Remove the row and count it in the stage report.
    Drop,
}

/// Vectorizer family used for feature engineering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorizerKind {
    Count,
    Tfidf,
}

/// Model family used for training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Logistic,
    NaiveBayes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestParams {
    /// Path to the raw CSV source.
    pub source: PathBuf,
    /// Fraction of rows assigned to the train partition.
    pub split_ratio: f64,
    /// Seed for the split shuffle.
    pub seed: u64,
    /// Column holding the raw text input.
    pub text_column: String,
    /// Column holding the binary label.
    pub label_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    pub lowercase: bool,
    pub strip_punctuation: bool,
    pub drop_policy: DropPolicy,
    /// Rows whose normalized text is shorter than this are uncoercible.
    pub min_text_length: usize,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            drop_policy: DropPolicy::Error,
            min_text_length: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureParams {
    pub vectorizer: VectorizerKind,
    /// Cap on vocabulary size; most frequent terms win.
    pub max_features: Option<usize>,
    pub min_token_length: usize,
    pub ngram_max: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            vectorizer: VectorizerKind::Tfidf,
            max_features: Some(5000),
            min_token_length: 2,
            ngram_max: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub model: ModelKind,
    pub seed: u64,
    /// Minimum train rows before fitting is attempted.
    pub min_rows: usize,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// L2 regularization strength for the logistic model.
    pub l2: f64,
    /// Laplace smoothing for the naive Bayes model.
    pub smoothing: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            model: ModelKind::Logistic,
            seed: 42,
            min_rows: 10,
            learning_rate: 0.1,
            max_iter: 1000,
            l2: 0.01,
            smoothing: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateParams {
    pub tracker_dir: PathBuf,
    pub run_name: Option<String>,
}

impl Default for EvaluateParams {
    fn default() -> Self {
        Self {
            tracker_dir: PathBuf::from("runs"),
            run_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeParams {
    pub host: String,
    pub port: u16,
}

impl Default for ServeParams {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Immutable parameter set threaded through every stage call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    pub ingest: IngestParams,
    #[serde(default)]
    pub preprocess: PreprocessParams,
    #[serde(default)]
    pub features: FeatureParams,
    #[serde(default)]
    pub train: TrainParams,
    #[serde(default)]
    pub evaluate: EvaluateParams,
    #[serde(default)]
    pub serve: ServeParams,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Params {
    /// Load and validate the parameter file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read params file {}: {}", path.display(), e))
        })?;

        let params: Params = serde_yaml::from_str(&raw).map_err(|e| {
            PipelineError::Config(format!("invalid params file {}: {}", path.display(), e))
        })?;

        params.validate()?;
        Ok(params)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let ratio = self.ingest.split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::Config(format!(
                "ingest.split_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        if self.features.ngram_max == 0 {
            return Err(PipelineError::Config(
                "features.ngram_max must be at least 1".to_string(),
            ));
        }
        if self.features.max_features == Some(0) {
            return Err(PipelineError::Config(
                "features.max_features must be positive when set".to_string(),
            ));
        }
        if self.train.max_iter == 0 {
            return Err(PipelineError::Config(
                "train.max_iter must be positive".to_string(),
            ));
        }
        if self.train.learning_rate <= 0.0 {
            return Err(PipelineError::Config(format!(
                "train.learning_rate must be positive, got {}",
                self.train.learning_rate
            )));
        }
        Ok(())
    }
}
