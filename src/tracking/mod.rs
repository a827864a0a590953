//! Experiment tracking.
//!
//! Each evaluated run is appended as one JSON line to `runs.jsonl` in the
//! tracker directory. Records are append-only: a run is never overwritten,
//! only superseded by a later record.

use crate::artifact::ArtifactRef;
use crate::error::{PipelineError, Result};
use crate::params::Params;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// One evaluated run: parameters, metric values, and the artifacts used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub params: Params,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<ArtifactRef>,
}

impl RunRecord {
    pub fn new(
        run_name: Option<String>,
        params: Params,
        metrics: BTreeMap<String, f64>,
        artifacts: Vec<ArtifactRef>,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            run_name,
            created_at: chrono::Utc::now(),
            params,
            metrics,
            artifacts,
        }
    }
}

/// Append-only file-backed run store.
pub struct ExperimentTracker {
    dir: PathBuf,
}

impl ExperimentTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn runs_file(&self) -> PathBuf {
        self.dir.join("runs.jsonl")
    }

    /// Append one record. Existing records are never touched.
    pub fn log_run(&self, record: &RunRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.runs_file())?;
        file.write_all(line.as_bytes())?;

        info!(run_id = %record.run_id, file = %self.runs_file().display(), "Run recorded");
        Ok(())
    }

    /// All recorded runs, oldest first.
    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        let path = self.runs_file();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path)?;
        let mut records = Vec::new();
        for (i, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: RunRecord = serde_json::from_str(line).map_err(|e| {
                PipelineError::ArtifactLoad(format!(
                    "{} line {}: {}",
                    path.display(),
                    i + 1,
                    e
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// The most recent record, if any run has been logged.
    pub fn last_run(&self) -> Result<Option<RunRecord>> {
        Ok(self.runs()?.pop())
    }
}
