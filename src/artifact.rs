//! Artifact references and the fixed filesystem layout.
//!
//! Stages exchange `ArtifactRef` values (path + content hash) in code; the
//! layout below is the only naming coupling between stages and must stay
//! stable for the inference service to find its inputs.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A persisted, immutable stage output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub sha256: String,
}

impl ArtifactRef {
    /// Hash an existing file into a reference.
    pub fn capture(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PipelineError::ArtifactLoad(format!("{}: {}", path.display(), e))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256: sha256_hex(&bytes),
        })
    }

    /// Capture a predecessor artifact, failing with a message that names the
    /// missing input when it is absent.
    pub fn require(path: &Path, produced_by: &str) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::ArtifactLoad(format!(
                "{} is missing; run the {} stage first",
                path.display(),
                produced_by
            )));
        }
        Self::capture(path)
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write bytes to a temporary sibling and rename into place, so readers never
/// observe a partial artifact and a failed stage leaves nothing behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<ArtifactRef> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(ArtifactRef {
        path: path.to_path_buf(),
        sha256: sha256_hex(bytes),
    })
}

/// Fixed set of named artifact paths for one run.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn raw_train(&self) -> PathBuf {
        self.root.join("train.csv")
    }

    pub fn raw_test(&self) -> PathBuf {
        self.root.join("test.csv")
    }

    pub fn clean_train(&self) -> PathBuf {
        self.root.join("train_clean.csv")
    }

    pub fn clean_test(&self) -> PathBuf {
        self.root.join("test_clean.csv")
    }

    pub fn vectorizer(&self) -> PathBuf {
        self.root.join("vectorizer.json")
    }

    pub fn train_features(&self) -> PathBuf {
        self.root.join("train_features.json")
    }

    pub fn test_features(&self) -> PathBuf {
        self.root.join("test_features.json")
    }

    pub fn model(&self) -> PathBuf {
        self.root.join("model.json")
    }

    pub fn metrics(&self) -> PathBuf {
        self.root.join("metrics.json")
    }
}
