//! Serving state: the loaded artifact snapshot and the metrics surface.

use crate::artifact::{ArtifactLayout, ArtifactRef};
use crate::error::{PipelineError, Result};
use crate::features::Vectorizer;
use crate::training::Classifier;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::metrics::ServiceMetrics;

/// The immutable pair of artifacts a prediction runs against. Loaded once at
/// startup; requests hold an `Arc` snapshot, so a swap is only visible to
/// requests that start after it.
#[derive(Debug)]
pub struct ServingArtifacts {
    pub vectorizer: Vectorizer,
    pub model: Classifier,
    pub vectorizer_ref: ArtifactRef,
    pub model_ref: ArtifactRef,
}

impl ServingArtifacts {
    /// Load and cross-check both artifacts. Any failure here is fatal: the
    /// service must not start serving without a consistent snapshot.
    pub fn load(layout: &ArtifactLayout) -> Result<Self> {
        let vectorizer_path = layout.vectorizer();
        let model_path = layout.model();

        let vectorizer_ref = ArtifactRef::require(&vectorizer_path, "featurize")?;
        let model_ref = ArtifactRef::require(&model_path, "train")?;

        let bytes = std::fs::read(&vectorizer_path).map_err(|e| {
            PipelineError::ArtifactLoad(format!("{}: {}", vectorizer_path.display(), e))
        })?;
        let vectorizer: Vectorizer = serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::ArtifactLoad(format!("{}: {}", vectorizer_path.display(), e))
        })?;
        if !vectorizer.is_fitted() {
            return Err(PipelineError::ArtifactLoad(format!(
                "{} holds an unfitted vectorizer",
                vectorizer_path.display()
            )));
        }

        let model = Classifier::load(&model_path)?;
        let model_width = model.n_features().ok_or_else(|| {
            PipelineError::ArtifactLoad(format!(
                "{} holds an unfitted model",
                model_path.display()
            ))
        })?;

        if vectorizer.vocabulary_len() != model_width {
            return Err(PipelineError::ArtifactLoad(format!(
                "vectorizer produces {} features but the model expects {}",
                vectorizer.vocabulary_len(),
                model_width
            )));
        }

        info!(
            vectorizer = %vectorizer_ref.sha256,
            model = %model_ref.sha256,
            features = model_width,
            "Serving artifacts loaded"
        );

        Ok(Self {
            vectorizer,
            model,
            vectorizer_ref,
            model_ref,
        })
    }
}

/// Application state shared across handlers.
pub struct AppState {
    artifacts: RwLock<Arc<ServingArtifacts>>,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(artifacts: ServingArtifacts) -> Self {
        Self {
            artifacts: RwLock::new(Arc::new(artifacts)),
            metrics: ServiceMetrics::new(),
        }
    }

    /// Snapshot for one request; the lock is held only for the clone.
    pub async fn snapshot(&self) -> Arc<ServingArtifacts> {
        self.artifacts.read().await.clone()
    }

    /// Atomic swap; in-flight requests keep the snapshot they started with.
    pub async fn swap(&self, artifacts: ServingArtifacts) {
        *self.artifacts.write().await = Arc::new(artifacts);
    }
}
