//! Library for relaunching streaming jobs from their recorded configuration
//!
//! This library provides modules for:
//! - Retrying requests against the control plane REST API
//! - Extracting embedded statements, pipeline names and TTLs from job configs
//! - Classifying jobs into query or ETL launch descriptors
//! - Recording and replaying job listings
//! - Relaunching jobs from written descriptor files
//! - Stopping running jobs

pub mod request_executor;
pub mod control_plane;
pub mod etl_mapping;
pub mod config_extractor;
pub mod checkpoint;
pub mod job_selection;
pub mod snapshot;
pub mod job_processor;
pub mod pipeline;
pub mod launcher;
pub mod stopper;
pub mod settings;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types and structs
pub use request_executor::{HttpTransport, RequestError, RequestExecutor, RetryPolicy, Transport};
pub use control_plane::{ControlPlaneClient, JobState, JobSummary};
pub use etl_mapping::{ArtifactInfo, EtlMapping};
pub use config_extractor::{ConfigExtractor, ExtractedConfig, TtlTable};
pub use checkpoint::resolve_resume_path;
pub use job_selection::JobFilter;
pub use snapshot::{Snapshot, SnapshotStore};
pub use job_processor::{
    BatchResults, ClassificationResult, EtlJobDescriptor, JobClassifier, JobProcessor, QueryJobDescriptor,
};
pub use pipeline::{JobSource, Pipeline, RunRequest, RunSummary};
pub use launcher::{LaunchSelection, Launcher};
pub use stopper::{StopReport, StopTarget, Stopper};
pub use settings::Settings;
