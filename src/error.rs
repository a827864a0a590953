//! Error types shared by the pipeline stages and the serving layer.
//!
//! Stage-level errors are fatal to the current run: a failed stage writes no
//! artifact and downstream stages abort on the missing input. Serving-level
//! errors are isolated per request and never take the process down.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad or missing parameters. Stops the run before any side effect.
    #[error("Config error: {0}")]
    Config(String),

    /// The raw data source could not be read.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// An expected column is absent from the source.
    #[error("Schema mismatch: expected column '{column}' in {context}")]
    SchemaMismatch { column: String, context: String },

    /// A row cannot be coerced to the expected schema and no drop policy
    /// is configured.
    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    /// Vectorizer fitting yielded zero usable features.
    #[error("Empty vocabulary: no usable terms after fitting on {n_docs} documents")]
    EmptyVocabulary { n_docs: usize },

    /// Training produced non-finite loss or weights.
    #[error("Training diverged: {0}")]
    TrainingDiverged(String),

    /// Fewer training rows than the configured minimum.
    #[error("Insufficient data: {actual} rows, minimum is {required}")]
    InsufficientData { required: usize, actual: usize },

    /// Test labels and predictions have incompatible cardinality or types.
    #[error("Label mismatch: {0}")]
    LabelMismatch(String),

    /// A persisted artifact is missing or incompatible. Fatal at startup.
    #[error("Artifact load failed: {0}")]
    ArtifactLoad(String),

    #[error("Model is not fitted")]
    ModelNotFitted,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data processing error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = PipelineError::SchemaMismatch {
            column: "text".to_string(),
            context: "data/reviews.csv".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("text"));
        assert!(msg.contains("reviews.csv"));
    }

    #[test]
    fn test_insufficient_data_display() {
        let err = PipelineError::InsufficientData { required: 10, actual: 3 };
        assert_eq!(err.to_string(), "Insufficient data: 3 rows, minimum is 10");
    }
}
