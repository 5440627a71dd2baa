//! Job processor module for classifying jobs into launch descriptors
//!
//! This module provides the batch pipeline for:
//! - Fetching each job's config document and checkpoint info
//! - Deciding between a declarative query job and an ETL jar job
//! - Building the matching launch descriptor
//! - Aggregating outcomes and rendering a Markdown run report

pub mod types;
pub mod classifier;
pub mod markdown;
pub mod core;

#[cfg(test)]
mod tests;

// Re-export main types and structs
pub use types::{
    BatchResults,
    ClassificationResult,
    ClassifiedJob,
    EtlJobDescriptor,
    JobOutcome,
    QueryJobDescriptor,
    QUERY_ENTRY_CLASS,
};

pub use classifier::{decode_program_args, encode_program_args, ClassifyError, JobClassifier};
pub use markdown::{MarkdownBuilder, MarkdownFormatter, RunContext};
pub use self::core::{JobProcessor, DEFAULT_WORKERS};
