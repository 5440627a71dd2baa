//! Stops running jobs one at a time before they are reprocessed

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use super::control_plane::{ControlPlaneClient, JobState, JobSummary};
use super::job_selection::JobFilter;

// Constants
pub const DEFAULT_STOP_INTERVAL: Duration = Duration::from_secs(5);

/// A job to stop and the name it is logged under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTarget {
    pub job_id: String,
    pub name: String,
}

impl StopTarget {
    /// Target known only by id
    pub fn from_id(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            name: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResult {
    pub job_id: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StopReport {
    pub planned: usize,
    pub dry_run: bool,
    pub results: Vec<StopResult>,
}

impl StopReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// 0 when every stop succeeded (or nothing was stopped), 2 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() == self.results.len() {
            0
        } else {
            2
        }
    }
}

pub struct Stopper {
    client: ControlPlaneClient,
    interval: Duration,
    dry_run: bool,
}

impl Stopper {
    pub fn new(client: ControlPlaneClient) -> Self {
        Self {
            client,
            interval: DEFAULT_STOP_INTERVAL,
            dry_run: false,
        }
    }

    /// Pause between consecutive stop requests
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Every job the control plane currently reports as RUNNING
    pub async fn running_jobs(&self) -> Result<Vec<StopTarget>> {
        let records = self.client.list_jobs().await.context("Failed to list running jobs")?;
        let targets: Vec<StopTarget> = JobFilter::in_state(JobState::Running)
            .apply(&records)
            .iter()
            .filter_map(JobSummary::from_raw)
            .map(|summary| StopTarget {
                job_id: summary.id,
                name: summary.name,
            })
            .collect();

        if targets.is_empty() {
            warn!("No RUNNING jobs found");
        } else {
            info!("Found {} RUNNING job(s) out of {}", targets.len(), records.len());
        }
        Ok(targets)
    }

    /// Stops the targets in order; each stop is independent of the others
    pub async fn stop_jobs(&self, targets: &[StopTarget]) -> StopReport {
        let mut report = StopReport {
            planned: targets.len(),
            dry_run: self.dry_run,
            results: Vec::new(),
        };

        if targets.is_empty() {
            warn!("No jobs to stop");
            return report;
        }

        info!("Stopping {} job(s)", targets.len());
        if self.dry_run {
            for (i, target) in targets.iter().enumerate() {
                info!("[{}/{}] Would stop {} ({})", i + 1, targets.len(), target.job_id, target.name);
            }
            return report;
        }

        for (i, target) in targets.iter().enumerate() {
            info!("[{}/{}] Stopping {} ({})", i + 1, targets.len(), target.job_id, target.name);
            let result = match self.client.stop_job(&target.job_id).await {
                Ok(_) => {
                    info!("Stopped job {}", target.job_id);
                    StopResult {
                        job_id: target.job_id.clone(),
                        success: true,
                        error: None,
                    }
                }
                Err(e) => {
                    error!("Failed to stop job {}: {:#}", target.job_id, e);
                    StopResult {
                        job_id: target.job_id.clone(),
                        success: false,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            report.results.push(result);

            if i + 1 < targets.len() && !self.interval.is_zero() {
                info!("Waiting {:?} before the next stop", self.interval);
                tokio::time::sleep(self.interval).await;
            }
        }

        info!("Stop finished: {}/{} succeeded", report.succeeded(), report.results.len());
        report
    }
}
