//! Core batch processing logic

use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::modules::control_plane::ControlPlaneClient;

use super::classifier::JobClassifier;
use super::types::{BatchResults, ClassificationResult, JobOutcome};

// Constants
pub const DEFAULT_WORKERS: usize = 5;

/// Fans job classification out over a bounded number of concurrent workers
///
/// Each job is fetched and classified independently; a failing job is counted
/// and left out of the result maps without affecting the rest of the batch.
#[derive(Clone)]
pub struct JobProcessor {
    client: ControlPlaneClient,
    classifier: JobClassifier,
    workers: usize,
}

impl JobProcessor {
    pub fn new(client: ControlPlaneClient, classifier: JobClassifier) -> Self {
        Self {
            client,
            classifier,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Sets the worker count; zero is treated as one
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers.unwrap_or(DEFAULT_WORKERS).max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn client(&self) -> &ControlPlaneClient {
        &self.client
    }

    // === Batch Execution ===

    /// Classifies every job id, collecting outcomes in completion order
    pub async fn process_all(&self, job_ids: &[String]) -> BatchResults {
        let start_time = Instant::now();
        let total = job_ids.len();
        let mut results = BatchResults {
            total,
            ..Default::default()
        };

        if total == 0 {
            warn!("No jobs to process");
            return results;
        }

        info!("Processing {} jobs with {} workers", total, self.workers);

        let semaphore = Semaphore::new(self.workers);
        let semaphore = &semaphore;
        let mut pending: FuturesUnordered<_> = job_ids
            .iter()
            .map(|job_id| async move {
                match semaphore.acquire().await {
                    Ok(_permit) => self.process_job(job_id).await,
                    Err(e) => JobOutcome::Failed {
                        job_id: job_id.clone(),
                        reason: format!("Failed to acquire worker permit: {}", e),
                    },
                }
            })
            .collect();

        let mut completed = 0usize;
        while let Some(outcome) = pending.next().await {
            completed += 1;
            info!(
                "Progress: {}/{} ({:.1}%)",
                completed,
                total,
                completed as f64 * 100.0 / total as f64
            );
            results.record(outcome);
        }

        info!(
            "Batch finished in {:?}: {} succeeded, {} failed out of {} ({} query, {} ETL)",
            start_time.elapsed(),
            results.succeeded,
            results.failed,
            total,
            results.query.len(),
            results.etl.len()
        );
        if let Some((job_id, reason)) = results.failed_jobs.first() {
            warn!("First failure: job {}: {}", job_id, reason);
        }

        results
    }

    // === Single Job ===

    /// Fetches config and checkpoints for one job and classifies it.
    ///
    /// A missing config fails the job; missing checkpoint info only means no
    /// savepoint is attached.
    pub async fn process_job(&self, job_id: &str) -> JobOutcome {
        info!("Processing job {}", job_id);

        let config = match self.client.job_config(job_id).await {
            Ok(config) => config,
            Err(e) => {
                error!("Job {}: {:#}", job_id, e);
                return JobOutcome::Failed {
                    job_id: job_id.to_string(),
                    reason: format!("{:#}", e),
                };
            }
        };

        let checkpoints = match self.client.job_checkpoints(job_id).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Job {}: continuing without savepoint: {:#}", job_id, e);
                None
            }
        };

        match self.classifier.classify(job_id, &config, checkpoints.as_ref()) {
            Ok(job) => {
                match &job.result {
                    ClassificationResult::Query(_) => info!("Job {} -> query descriptor {}", job_id, job.key()),
                    ClassificationResult::Etl(d) => {
                        info!("Job {} -> ETL descriptor {} ({})", job_id, job.key(), d.etl)
                    }
                }
                JobOutcome::Classified(job)
            }
            Err(e) => {
                error!("Skipping job: {}", e);
                JobOutcome::Failed {
                    job_id: job_id.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}
