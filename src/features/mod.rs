//! Feature engineering stage: fit the vectorizer on the train partition and
//! derive feature matrices for both partitions.
//!
//! The fitted vectorizer is persisted as its own artifact so the inference
//! service can load it independently of the training process. Fitting on
//! anything but the train partition is a data leak; this stage is the only
//! place a vectorizer is ever fitted.

mod vectorizer;

pub use vectorizer::{CountVectorizer, TfidfVectorizer, Tokenizer, Vectorizer};

use crate::artifact::{write_atomic, ArtifactLayout, ArtifactRef};
use crate::error::{PipelineError, Result};
use crate::params::Params;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A numeric feature matrix plus aligned labels, persisted between stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    pub n_features: usize,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl FeatureSet {
    pub fn new(matrix: &Array2<f64>, labels: &Array1<f64>) -> Self {
        Self {
            n_features: matrix.ncols(),
            rows: matrix.rows().into_iter().map(|r| r.to_vec()).collect(),
            labels: labels.to_vec(),
        }
    }

    pub fn matrix(&self) -> Result<Array2<f64>> {
        let flat: Vec<f64> = self.rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.rows.len(), self.n_features), flat).map_err(|e| {
            PipelineError::ShapeError {
                expected: format!("{} x {}", self.rows.len(), self.n_features),
                actual: e.to_string(),
            }
        })
    }

    pub fn labels_array(&self) -> Array1<f64> {
        Array1::from_vec(self.labels.clone())
    }

    pub fn save(&self, path: &Path) -> Result<ArtifactRef> {
        let json = serde_json::to_vec(self)?;
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

/// Artifacts produced by the feature engineering stage.
#[derive(Debug, Clone)]
pub struct FeatureOutput {
    pub vectorizer: ArtifactRef,
    pub train_features: ArtifactRef,
    pub test_features: ArtifactRef,
    pub vocabulary_len: usize,
}

pub fn run(params: &Params) -> Result<FeatureOutput> {
    let layout = ArtifactLayout::new(&params.artifacts_dir);
    ArtifactRef::require(&layout.clean_train(), "preprocess")?;
    ArtifactRef::require(&layout.clean_test(), "preprocess")?;

    let (train_texts, train_labels) = read_partition(&layout.clean_train(), params)?;
    let (test_texts, test_labels) = read_partition(&layout.clean_test(), params)?;

    let mut vectorizer = Vectorizer::from_params(&params.features);
    let train_matrix = vectorizer.fit_transform(&train_texts)?;
    let test_matrix = vectorizer.transform(&test_texts)?;

    let vectorizer_ref = write_atomic(
        &layout.vectorizer(),
        &serde_json::to_vec_pretty(&vectorizer)?,
    )?;
    let train_ref =
        FeatureSet::new(&train_matrix, &Array1::from_vec(train_labels)).save(&layout.train_features())?;
    let test_ref =
        FeatureSet::new(&test_matrix, &Array1::from_vec(test_labels)).save(&layout.test_features())?;

    info!(
        vocabulary = vectorizer.vocabulary_len(),
        train_rows = train_matrix.nrows(),
        test_rows = test_matrix.nrows(),
        "Feature engineering complete"
    );

    Ok(FeatureOutput {
        vectorizer: vectorizer_ref,
        train_features: train_ref,
        test_features: test_ref,
        vocabulary_len: vectorizer.vocabulary_len(),
    })
}

fn read_partition(path: &Path, params: &Params) -> Result<(Vec<String>, Vec<f64>)> {
    let file = std::fs::File::open(path).map_err(|e| {
        PipelineError::DataUnavailable(format!("{}: {}", path.display(), e))
    })?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()?;

    let texts: Vec<String> = df
        .column(&params.ingest.text_column)?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|s| s.unwrap_or_default().to_string())
        .collect();

    let labels: Vec<f64> = df
        .column(&params.ingest.label_column)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();

    Ok((texts, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_feature_set_round_trip() {
        let matrix = array![[1.0, 0.0], [0.5, 2.0]];
        let labels = array![0.0, 1.0];
        let set = FeatureSet::new(&matrix, &labels);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        set.save(&path).unwrap();

        let loaded = FeatureSet::load(&path).unwrap();
        assert_eq!(loaded.matrix().unwrap(), matrix);
        assert_eq!(loaded.labels_array(), labels);
    }

    #[test]
    fn test_feature_set_load_missing_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FeatureSet::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactLoad(_)));
    }
}
