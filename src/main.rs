//! Modelflow - Main Entry Point

use clap::Parser;
use modelflow::cli::{
    cmd_evaluate, cmd_featurize, cmd_ingest, cmd_preprocess, cmd_run, cmd_serve, cmd_train, Cli,
    Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelflow=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { params } => cmd_ingest(&params)?,
        Commands::Preprocess { params } => cmd_preprocess(&params)?,
        Commands::Featurize { params } => cmd_featurize(&params)?,
        Commands::Train { params } => cmd_train(&params)?,
        Commands::Evaluate { params } => cmd_evaluate(&params)?,
        Commands::Run { params } => cmd_run(&params)?,
        Commands::Serve { params } => cmd_serve(&params).await?,
    }

    Ok(())
}
