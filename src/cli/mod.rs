//! Command-line interface.
//!
//! Each pipeline stage is an independent subcommand taking only the
//! parameter file, so an external orchestrator can invoke stages one at a
//! time. Exit code 0 means the stage succeeded and its artifacts are in
//! place; any failure aborts with a message naming the failing stage.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::params::Params;
use crate::{evaluation, features, ingest, preprocessing, training};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", muted(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "modelflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staged training pipeline and inference service for text classification")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split the raw source into train/test partitions
    Ingest {
        /// Parameter file
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Clean and normalize the partitions
    Preprocess {
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Fit the vectorizer on train and derive both feature matrices
    Featurize {
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Fit the model on the train features
    Train {
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Score the model on held-out data and record the run
    Evaluate {
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Run all five stages in order
    Run {
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Serve the trained model over HTTP
    Serve {
        #[arg(short, long, default_value = "params.yaml")]
        params: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_ingest(params_path: &Path) -> anyhow::Result<()> {
    let params = Params::load(params_path)?;
    section("Ingest");

    let start = Instant::now();
    let output = ingest::run(&params).context("ingest stage failed")?;

    step_ok(&format!(
        "split {} rows into {} train / {} test in {:?}",
        output.rows_total,
        output.rows_train,
        output.rows_test,
        start.elapsed()
    ));
    kv("train", &output.train.path.display().to_string());
    kv("test", &output.test.path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_preprocess(params_path: &Path) -> anyhow::Result<()> {
    let params = Params::load(params_path)?;
    section("Preprocess");

    let start = Instant::now();
    let output = preprocessing::run(&params).context("preprocess stage failed")?;

    step_ok(&format!(
        "cleaned {} train / {} test rows in {:?}",
        output.rows_train,
        output.rows_test,
        start.elapsed()
    ));
    if output.rows_dropped_train + output.rows_dropped_test > 0 {
        kv(
            "dropped",
            &format!(
                "{} train, {} test",
                output.rows_dropped_train, output.rows_dropped_test
            ),
        );
    }
    println!();
    Ok(())
}

pub fn cmd_featurize(params_path: &Path) -> anyhow::Result<()> {
    let params = Params::load(params_path)?;
    section("Featurize");

    let start = Instant::now();
    let output = features::run(&params).context("featurize stage failed")?;

    step_ok(&format!(
        "fitted vocabulary of {} terms in {:?}",
        output.vocabulary_len,
        start.elapsed()
    ));
    kv("vectorizer", &output.vectorizer.path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_train(params_path: &Path) -> anyhow::Result<()> {
    let params = Params::load(params_path)?;
    section("Train");

    let start = Instant::now();
    let output = training::run(&params).context("train stage failed")?;

    step_ok(&format!(
        "fitted on {} rows × {} features in {:?}",
        output.n_rows,
        output.n_features,
        start.elapsed()
    ));
    kv("train accuracy", &format!("{:.4}", output.train_accuracy));
    kv("model", &output.model.path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_evaluate(params_path: &Path) -> anyhow::Result<()> {
    let params = Params::load(params_path)?;
    section("Evaluate");

    let start = Instant::now();
    let output = evaluation::run(&params).context("evaluate stage failed")?;

    step_ok(&format!(
        "scored {} held-out rows in {:?}",
        output.report.n_samples,
        start.elapsed()
    ));
    if let Some(accuracy) = output.report.accuracy {
        kv("accuracy", &format!("{:.4}", accuracy));
    }
    if let Some(f1) = output.report.f1_score {
        kv("f1", &format!("{:.4}", f1));
    }
    if let Some(auc) = output.report.auc_roc {
        kv("auc_roc", &format!("{:.4}", auc));
    }
    kv("run id", &output.run_id);
    println!();
    Ok(())
}

/// The orchestrator-facing convenience path: all stages, strictly in order,
/// aborting on the first failure.
pub fn cmd_run(params_path: &Path) -> anyhow::Result<()> {
    cmd_ingest(params_path)?;
    cmd_preprocess(params_path)?;
    cmd_featurize(params_path)?;
    cmd_train(params_path)?;
    cmd_evaluate(params_path)?;
    Ok(())
}

pub async fn cmd_serve(params_path: &Path) -> anyhow::Result<()> {
    let params = Params::load(params_path)?;
    crate::server::run_server(&params).await
}
