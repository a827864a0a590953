//! Modelflow - staged training pipeline with an HTTP inference service
//!
//! This crate moves a tabular text dataset through a fixed sequence of
//! transformations and publishes the resulting model behind a prediction
//! endpoint:
//!
//! - [`params`] - Run-wide parameter store, one section per stage
//! - [`artifact`] - Artifact references and the fixed filesystem layout
//! - [`ingest`] - Deterministic train/test split of the raw source
//! - [`preprocessing`] - Cleaning and normalization with explicit drop accounting
//! - [`features`] - Vectorizer fitting (train only) and feature matrices
//! - [`training`] - Model fitting and the persisted model artifact
//! - [`evaluation`] - Held-out scoring and metric records
//! - [`tracking`] - Append-only experiment tracker
//! - [`server`] - Concurrent inference service with a metrics scrape surface
//! - [`cli`] - Stage-per-subcommand command-line interface
//!
//! Stages are pure functions of their input artifacts and the parameter set;
//! each reads what its predecessor wrote and nothing else.

pub mod artifact;
pub mod error;
pub mod params;

// Pipeline stages, in execution order
pub mod ingest;
pub mod preprocessing;
pub mod features;
pub mod training;
pub mod evaluation;
pub mod tracking;

// Services
pub mod server;
pub mod cli;

pub use error::{PipelineError, Result};
