//! Types and data structures for the job processor module

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entry class of the shared jar that runs declarative query jobs
pub const QUERY_ENTRY_CLASS: &str = "com.quick.marketing.MarketingSQLTask";

/// Launch descriptor for a declarative query job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryJobDescriptor {
    #[serde(rename = "entryClass")]
    pub entry_class: String,
    /// Always written as `null`; the control plane picks the parallelism
    pub parallelism: Option<u32>,
    /// Base64 of the compact JSON extracted configuration
    #[serde(rename = "programArgs")]
    pub program_args: String,
    #[serde(rename = "savepointPath", default, skip_serializing_if = "Option::is_none")]
    pub savepoint_path: Option<String>,
}

/// Launch descriptor for a jar-based ETL job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtlJobDescriptor {
    /// `"{description} {key} |{artifact}"`, or empty when the artifact is unknown
    pub etl: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savepoint: Option<String>,
}

/// Exactly one descriptor per classified job
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    Query(QueryJobDescriptor),
    Etl(EtlJobDescriptor),
}

impl ClassificationResult {
    pub fn family(&self) -> &'static str {
        match self {
            ClassificationResult::Query(_) => "query",
            ClassificationResult::Etl(_) => "etl",
        }
    }

    pub fn savepoint(&self) -> Option<&str> {
        match self {
            ClassificationResult::Query(d) => d.savepoint_path.as_deref(),
            ClassificationResult::Etl(d) => d.savepoint.as_deref(),
        }
    }
}

/// A classified job with the name it was classified under
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedJob {
    pub job_id: String,
    pub job_name: String,
    pub result: ClassificationResult,
}

impl ClassifiedJob {
    /// Output key `"{job_id}-{job_name}"`
    pub fn key(&self) -> String {
        format!("{}-{}", self.job_id, self.job_name)
    }
}

/// What happened to one job in a batch
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Classified(ClassifiedJob),
    Failed { job_id: String, reason: String },
}

/// Aggregated batch output, keyed by `"{job_id}-{job_name}"`
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResults {
    pub query: BTreeMap<String, QueryJobDescriptor>,
    pub etl: BTreeMap<String, EtlJobDescriptor>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Job id and reason for every failed job, in completion order
    pub failed_jobs: Vec<(String, String)>,
}

impl BatchResults {
    pub fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Classified(job) => {
                self.succeeded += 1;
                let key = job.key();
                match job.result {
                    ClassificationResult::Query(descriptor) => {
                        self.query.insert(key, descriptor);
                    }
                    ClassificationResult::Etl(descriptor) => {
                        self.etl.insert(key, descriptor);
                    }
                }
            }
            JobOutcome::Failed { job_id, reason } => {
                self.failed += 1;
                self.failed_jobs.push((job_id, reason));
            }
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.total > 0 && self.failed == 0
    }
}
