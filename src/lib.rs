//! # Job Relauncher Library
//!
//! Reads finished streaming jobs from a control plane, recovers the
//! configuration each one ran with, and writes launch descriptors that bring
//! them back up:
//! - declarative query jobs are relaunched on a shared jar with their
//!   statements passed as base64 program arguments
//! - ETL jobs are relaunched from the prebuilt jar their name maps to
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use job_relauncher::{
//!     ControlPlaneClient, HttpTransport, JobClassifier, JobFilter, JobProcessor, JobSource,
//!     JobState, Pipeline, RunRequest, Settings, SnapshotStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::default();
//!     let transport = HttpTransport::new(
//!         &settings.api.base_url,
//!         &settings.api.username,
//!         &settings.api.password,
//!         settings.timeout(),
//!     )?;
//!     let client = ControlPlaneClient::new(Arc::new(transport), settings.retry_policy(), &settings.api.base_url);
//!     let processor = JobProcessor::new(client, JobClassifier::default());
//!     let pipeline = Pipeline::new(processor, SnapshotStore::new(&settings.output.snapshot_dir));
//!
//!     let summary = pipeline
//!         .run(&RunRequest {
//!             source: JobSource::Live,
//!             filter: JobFilter::in_state(JobState::Finished),
//!             save_snapshot: true,
//!             query_output: settings.output.query_file.clone(),
//!             etl_output: settings.output.etl_file.clone(),
//!             report_output: None,
//!         })
//!         .await?;
//!
//!     println!("{} succeeded, {} failed", summary.results.succeeded, summary.results.failed);
//!     Ok(())
//! }
//! ```

// Include the modules from the modules directory
#[path = "../modules/mod.rs"]
pub mod modules;

// Re-export everything from modules for easy access
pub use modules::*;

pub use anyhow::{Context, Result};

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library information
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
