//! Ingestion stage: fetch the raw source and split it into train/test
//! partitions.
//!
//! The split is a deterministic function of (source content hash, ratio,
//! seed): re-running with the same inputs reproduces byte-identical
//! partitions.

use crate::artifact::{sha256_hex, write_atomic, ArtifactLayout, ArtifactRef};
use crate::error::{PipelineError, Result};
use crate::params::Params;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Artifacts and row counts produced by the ingestion stage.
#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub train: ArtifactRef,
    pub test: ArtifactRef,
    pub rows_total: usize,
    pub rows_train: usize,
    pub rows_test: usize,
}

/// Read the configured source, validate its schema, and write the two
/// partitions.
pub fn run(params: &Params) -> Result<IngestOutput> {
    let source = &params.ingest.source;
    let bytes = std::fs::read(source).map_err(|e| {
        PipelineError::DataUnavailable(format!("{}: {}", source.display(), e))
    })?;

    let df = read_csv_bytes(&bytes)?;
    check_schema(&df, params)?;

    let n = df.height();
    // Mix the seed with the content hash so the shuffle is a pure function
    // of (content, ratio, seed).
    let content_seed = params.ingest.seed ^ hash_prefix(&bytes);
    let (train_idx, test_idx) = split_indices(n, params.ingest.split_ratio, content_seed);

    let mut train_df = take_rows(&df, &train_idx)?;
    let mut test_df = take_rows(&df, &test_idx)?;

    let layout = ArtifactLayout::new(&params.artifacts_dir);
    layout.ensure()?;
    let train = write_partition(&mut train_df, &layout.raw_train())?;
    let test = write_partition(&mut test_df, &layout.raw_test())?;

    info!(
        source = %source.display(),
        rows = n,
        train = train_idx.len(),
        test = test_idx.len(),
        "Ingestion complete"
    );

    Ok(IngestOutput {
        train,
        test,
        rows_total: n,
        rows_train: train_idx.len(),
        rows_test: test_idx.len(),
    })
}

fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(cursor)
        .finish()
        .map_err(PipelineError::from)
}

fn check_schema(df: &DataFrame, params: &Params) -> Result<()> {
    for column in [&params.ingest.text_column, &params.ingest.label_column] {
        if df.column(column).is_err() {
            return Err(PipelineError::SchemaMismatch {
                column: column.clone(),
                context: params.ingest.source.display().to_string(),
            });
        }
    }
    Ok(())
}

/// First 8 bytes of the content's sha256, as a shuffle-seed component.
fn hash_prefix(bytes: &[u8]) -> u64 {
    let hex = sha256_hex(bytes);
    u64::from_str_radix(&hex[..16], 16).unwrap_or(0)
}

/// Shuffle 0..n with a seeded RNG and cut at the split ratio. Both
/// partitions are kept non-empty whenever n >= 2.
fn split_indices(n: usize, ratio: f64, seed: u64) -> (Vec<u32>, Vec<u32>) {
    let mut indices: Vec<u32> = (0..n as u32).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut n_train = (n as f64 * ratio).round() as usize;
    if n >= 2 {
        n_train = n_train.clamp(1, n - 1);
    }

    let test = indices.split_off(n_train);
    (indices, test)
}

fn take_rows(df: &DataFrame, indices: &[u32]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx", indices.to_vec());
    df.take(&idx).map_err(PipelineError::from)
}

fn write_partition(df: &mut DataFrame, path: &std::path::Path) -> Result<ArtifactRef> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).finish(df)?;
    write_atomic(path, &buf)
}
