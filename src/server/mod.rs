//! Inference service.
//!
//! Loads the persisted feature transform and model once at startup, then
//! serves predictions concurrently against that immutable snapshot. A load
//! failure is fatal: the process never reaches Ready on missing or
//! incompatible artifacts.

mod api;
mod error;
mod handlers;
mod metrics;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use metrics::ServiceMetrics;
pub use state::{AppState, ServingArtifacts};

use crate::artifact::ArtifactLayout;
use crate::params::Params;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Start the service with artifacts from the configured layout. Blocks until
/// shutdown.
pub async fn run_server(params: &Params) -> anyhow::Result<()> {
    let layout = ArtifactLayout::new(&params.artifacts_dir);
    let artifacts = ServingArtifacts::load(&layout)?;
    let state = Arc::new(AppState::new(artifacts));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", params.serve.host, params.serve.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        "Inference service listening"
    );
    info!(url = %format!("http://{}/predict", addr), "Prediction endpoint available");
    info!(url = %format!("http://{}/metrics", addr), "Metrics endpoint available");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Shutdown signal received, stopping service gracefully");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Service shut down cleanly");
    Ok(())
}
