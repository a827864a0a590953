//! Evaluation stage: score the fitted model against held-out features,
//! persist the metric record, and register the run with the experiment
//! tracker.

mod metrics;

pub use metrics::EvalReport;

use crate::artifact::{write_atomic, ArtifactLayout, ArtifactRef};
use crate::error::Result;
use crate::features::FeatureSet;
use crate::params::Params;
use crate::tracking::{ExperimentTracker, RunRecord};
use crate::training::Classifier;
use tracing::info;

/// Artifacts and record identity produced by the evaluation stage.
#[derive(Debug, Clone)]
pub struct EvalOutput {
    pub metrics: ArtifactRef,
    pub report: EvalReport,
    pub run_id: String,
}

pub fn run(params: &Params) -> Result<EvalOutput> {
    let layout = ArtifactLayout::new(&params.artifacts_dir);
    let model_ref = ArtifactRef::require(&layout.model(), "train")?;
    let features_ref = ArtifactRef::require(&layout.test_features(), "featurize")?;
    let vectorizer_ref = ArtifactRef::require(&layout.vectorizer(), "featurize")?;

    let model = Classifier::load(&layout.model())?;
    let set = FeatureSet::load(&layout.test_features())?;
    let x = set.matrix()?;
    let y = set.labels_array();

    let predictions = model.predict(&x)?;
    let probabilities = model.predict_proba(&x)?;
    let report = EvalReport::compute(&y, &predictions, &probabilities)?;

    let metrics_ref = write_atomic(&layout.metrics(), &serde_json::to_vec_pretty(&report)?)?;

    let record = RunRecord::new(
        params.evaluate.run_name.clone(),
        params.clone(),
        report.to_map(),
        vec![vectorizer_ref, model_ref, metrics_ref.clone()],
    );
    let tracker = ExperimentTracker::new(&params.evaluate.tracker_dir);
    tracker.log_run(&record)?;

    info!(
        run_id = %record.run_id,
        accuracy = report.accuracy,
        auc_roc = report.auc_roc,
        n_samples = report.n_samples,
        "Evaluation complete"
    );

    Ok(EvalOutput {
        metrics: metrics_ref,
        report,
        run_id: record.run_id,
    })
}
