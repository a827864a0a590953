//! Preprocessing stage: clean and normalize a partition.
//!
//! Transforms are declared and deterministic: text normalization, label
//! coercion, null handling. Rows are never silently dropped; the drop policy
//! is explicit and every removal is counted in the stage report.

use crate::artifact::{write_atomic, ArtifactLayout, ArtifactRef};
use crate::error::{PipelineError, Result};
use crate::params::{DropPolicy, Params, PreprocessParams};
use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Artifacts and row accounting produced by the preprocessing stage.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub train: ArtifactRef,
    pub test: ArtifactRef,
    pub rows_train: usize,
    pub rows_test: usize,
    pub rows_dropped_train: usize,
    pub rows_dropped_test: usize,
}

pub fn run(params: &Params) -> Result<PreprocessOutput> {
    let layout = ArtifactLayout::new(&params.artifacts_dir);
    ArtifactRef::require(&layout.raw_train(), "ingest")?;
    ArtifactRef::require(&layout.raw_test(), "ingest")?;

    let (train_df, dropped_train) = clean_partition(&layout.raw_train(), params)?;
    let (test_df, dropped_test) = clean_partition(&layout.raw_test(), params)?;

    let train = write_partition(train_df.clone(), &layout.clean_train())?;
    let test = write_partition(test_df.clone(), &layout.clean_test())?;

    info!(
        train_rows = train_df.height(),
        test_rows = test_df.height(),
        dropped_train,
        dropped_test,
        "Preprocessing complete"
    );

    Ok(PreprocessOutput {
        train,
        test,
        rows_train: train_df.height(),
        rows_test: test_df.height(),
        rows_dropped_train: dropped_train,
        rows_dropped_test: dropped_test,
    })
}

/// Clean one partition, returning the cleaned frame and the drop count.
fn clean_partition(path: &Path, params: &Params) -> Result<(DataFrame, usize)> {
    let df = read_csv(path)?;
    let text_col = &params.ingest.text_column;
    let label_col = &params.ingest.label_column;

    let text_series = df
        .column(text_col)?
        .cast(&DataType::String)?
        .str()?
        .clone();
    // Non-strict cast: unparseable labels become nulls and fall under the
    // drop policy.
    let label_series = df
        .column(label_col)?
        .cast(&DataType::Float64)?
        .f64()?
        .clone();

    let mut texts = Vec::with_capacity(df.height());
    let mut labels = Vec::with_capacity(df.height());
    let mut dropped = 0usize;

    for row in 0..df.height() {
        match coerce_row(
            text_series.get(row),
            label_series.get(row),
            &params.preprocess,
        ) {
            Ok((text, label)) => {
                texts.push(text);
                labels.push(label);
            }
            Err(reason) => match params.preprocess.drop_policy {
                DropPolicy::Error => {
                    return Err(PipelineError::InvalidRecord { row, reason });
                }
                DropPolicy::Drop => {
                    dropped += 1;
                    warn!(row, %reason, partition = %path.display(), "Dropping row");
                }
            },
        }
    }

    let cleaned = df!(
        text_col.as_str() => &texts,
        label_col.as_str() => &labels,
    )?;

    Ok((cleaned, dropped))
}

/// Coerce one row to (normalized text, binary label); the error is the
/// human-readable reason the row is invalid.
fn coerce_row(
    text: Option<&str>,
    label: Option<f64>,
    params: &PreprocessParams,
) -> std::result::Result<(String, f64), String> {
    let raw = text.ok_or_else(|| "null text".to_string())?;
    let normalized = normalize_text(raw, params);
    if normalized.len() < params.min_text_length {
        return Err(format!(
            "normalized text shorter than {} chars",
            params.min_text_length
        ));
    }

    let label = label.ok_or_else(|| "null or non-numeric label".to_string())?;
    if label != 0.0 && label != 1.0 {
        return Err(format!("label {} is not binary", label));
    }

    Ok((normalized, label))
}

/// Lowercasing, punctuation stripping, and whitespace collapsing per the
/// declared parameters.
pub fn normalize_text(raw: &str, params: &PreprocessParams) -> String {
    let lowered = if params.lowercase {
        raw.to_lowercase()
    } else {
        raw.to_string()
    };

    let stripped: String = if params.strip_punctuation {
        lowered
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect()
    } else {
        lowered
    };

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = std::fs::File::open(path).map_err(|e| {
        PipelineError::DataUnavailable(format!("{}: {}", path.display(), e))
    })?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(PipelineError::from)
}

fn write_partition(mut df: DataFrame, path: &Path) -> Result<ArtifactRef> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).finish(&mut df)?;
    write_atomic(path, &buf)
}
