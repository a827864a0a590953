//! Integration test: full pipeline (ingest → preprocess → featurize → train → evaluate)

use modelflow::artifact::ArtifactLayout;
use modelflow::params::{DropPolicy, Params};
use modelflow::tracking::ExperimentTracker;
use modelflow::{evaluation, features, ingest, preprocessing, training, PipelineError};
use polars::prelude::*;
use std::path::Path;

const SPAM_PHRASES: [&str; 5] = [
    "free money offer now",
    "win a prize claim your reward",
    "limited offer act now free",
    "cheap loans guaranteed win",
    "claim free cash prize today",
];

const HAM_PHRASES: [&str; 5] = [
    "meeting notes from monday",
    "quarterly report attached for review",
    "lunch plans for the team",
    "schedule for next week posted",
    "minutes from the project meeting",
];

/// Write a labeled 100-row CSV source under `dir` and return a params set
/// pointing every stage into that directory.
fn setup_params(dir: &Path, n_rows: usize) -> Params {
    let source = dir.join("reviews.csv");
    let mut csv = String::from("text,label\n");
    for i in 0..n_rows {
        let (phrase, label) = if i % 2 == 0 {
            (SPAM_PHRASES[i % SPAM_PHRASES.len()], 1)
        } else {
            (HAM_PHRASES[i % HAM_PHRASES.len()], 0)
        };
        csv.push_str(&format!("{} sample {},{}\n", phrase, i, label));
    }
    std::fs::write(&source, csv).unwrap();

    let yaml = format!(
        r#"
artifacts_dir: {artifacts}
ingest:
  source: {source}
  split_ratio: 0.8
  seed: 42
  text_column: text
  label_column: label
preprocess:
  drop_policy: drop
train:
  max_iter: 2000
evaluate:
  tracker_dir: {tracker}
"#,
        artifacts = dir.join("artifacts").display(),
        source = source.display(),
        tracker = dir.join("runs").display(),
    );
    serde_yaml::from_str(&yaml).unwrap()
}

fn read_texts(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(file)
        .finish()
        .unwrap();
    df.column("text")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|s| s.unwrap().to_string())
        .collect()
}

#[test]
fn test_split_scenario_100_rows() {
    let dir = tempfile::tempdir().unwrap();
    let params = setup_params(dir.path(), 100);

    let output = ingest::run(&params).unwrap();
    assert_eq!(output.rows_total, 100);
    assert_eq!(output.rows_train, 80);
    assert_eq!(output.rows_test, 20);

    // Disjoint, and the union (by row identity) equals the source.
    let layout = ArtifactLayout::new(&params.artifacts_dir);
    let mut train = read_texts(&layout.raw_train());
    let test = read_texts(&layout.raw_test());
    for t in &test {
        assert!(!train.contains(t), "partitions must be disjoint");
    }
    train.extend(test);
    train.sort();

    let mut source: Vec<String> = (0..100)
        .map(|i| {
            let phrase = if i % 2 == 0 {
                SPAM_PHRASES[i % SPAM_PHRASES.len()]
            } else {
                HAM_PHRASES[i % HAM_PHRASES.len()]
            };
            format!("{} sample {}", phrase, i)
        })
        .collect();
    source.sort();
    assert_eq!(train, source);
}

#[test]
fn test_ingest_is_deterministic() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let params_a = setup_params(dir_a.path(), 60);
    let params_b = setup_params(dir_b.path(), 60);

    let out_a = ingest::run(&params_a).unwrap();
    let out_b = ingest::run(&params_b).unwrap();

    // Same content, ratio, and seed: byte-identical partitions.
    assert_eq!(out_a.train.sha256, out_b.train.sha256);
    assert_eq!(out_a.test.sha256, out_b.test.sha256);
}

#[test]
fn test_ingest_missing_source_is_data_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = setup_params(dir.path(), 10);
    params.ingest.source = dir.path().join("absent.csv");

    let err = ingest::run(&params).unwrap_err();
    assert!(matches!(err, PipelineError::DataUnavailable(_)));
}

#[test]
fn test_ingest_missing_column_is_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = setup_params(dir.path(), 10);
    params.ingest.label_column = "sentiment".to_string();

    let err = ingest::run(&params).unwrap_err();
    match err {
        PipelineError::SchemaMismatch { column, .. } => assert_eq!(column, "sentiment"),
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn test_stage_aborts_on_missing_predecessor_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let params = setup_params(dir.path(), 20);

    // Preprocess without ingest having run.
    let err = preprocessing::run(&params).unwrap_err();
    assert!(matches!(err, PipelineError::ArtifactLoad(_)));
    assert!(err.to_string().contains("ingest"));

    // Train without featurize having run.
    let err = training::run(&params).unwrap_err();
    assert!(err.to_string().contains("featurize"));
}

#[test]
fn test_preprocess_counts_dropped_rows() {
    let dir = tempfile::tempdir().unwrap();
    let params = setup_params(dir.path(), 40);

    // Rewrite the source with two rows that cannot be coerced.
    let source = dir.path().join("reviews.csv");
    let mut csv = std::fs::read_to_string(&source).unwrap();
    csv.push_str(",1\n");          // empty text
    csv.push_str("plain words,7\n"); // non-binary label
    std::fs::write(&source, csv).unwrap();

    ingest::run(&params).unwrap();
    let output = preprocessing::run(&params).unwrap();
    assert_eq!(output.rows_dropped_train + output.rows_dropped_test, 2);
}

#[test]
fn test_preprocess_error_policy_rejects_bad_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = setup_params(dir.path(), 40);
    params.preprocess.drop_policy = DropPolicy::Error;

    let source = dir.path().join("reviews.csv");
    let mut csv = std::fs::read_to_string(&source).unwrap();
    csv.push_str("plain words,7\n");
    std::fs::write(&source, csv).unwrap();

    ingest::run(&params).unwrap();
    let err = preprocessing::run(&params).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRecord { .. }));
}

#[test]
fn test_full_pipeline_trains_and_evaluates() {
    let dir = tempfile::tempdir().unwrap();
    let params = setup_params(dir.path(), 100);

    ingest::run(&params).unwrap();
    preprocessing::run(&params).unwrap();
    let feat = features::run(&params).unwrap();
    assert!(feat.vocabulary_len > 0);

    let trained = training::run(&params).unwrap();
    assert_eq!(trained.n_features, feat.vocabulary_len);

    let eval = evaluation::run(&params).unwrap();
    // The corpus is cleanly separable; the held-out accuracy must reflect it.
    assert!(eval.report.accuracy.unwrap() > 0.9);

    // The run is registered with the tracker, append-only.
    let tracker = ExperimentTracker::new(&params.evaluate.tracker_dir);
    let last = tracker.last_run().unwrap().unwrap();
    assert_eq!(last.run_id, eval.run_id);
    assert!(last.metrics.contains_key("accuracy"));
    assert_eq!(last.artifacts.len(), 3);
}

#[test]
fn test_rerun_reproduces_metrics() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let params_a = setup_params(dir_a.path(), 80);
    let params_b = setup_params(dir_b.path(), 80);

    let run = |params: &Params| {
        ingest::run(params).unwrap();
        preprocessing::run(params).unwrap();
        features::run(params).unwrap();
        training::run(params).unwrap();
        evaluation::run(params).unwrap()
    };

    let eval_a = run(&params_a);
    let eval_b = run(&params_b);

    let a = eval_a.report.accuracy.unwrap();
    let b = eval_b.report.accuracy.unwrap();
    assert!((a - b).abs() < 1e-12);

    let a = eval_a.report.log_loss.unwrap();
    let b = eval_b.report.log_loss.unwrap();
    assert!((a - b).abs() < 1e-9);
}

#[test]
fn test_train_rejects_insufficient_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = setup_params(dir.path(), 20);
    params.train.min_rows = 1000;

    ingest::run(&params).unwrap();
    preprocessing::run(&params).unwrap();
    features::run(&params).unwrap();

    let err = training::run(&params).unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { .. }));
}
