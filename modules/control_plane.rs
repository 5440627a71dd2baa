//! Typed calls against the control plane REST API

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::request_executor::{RequestError, RequestExecutor, RetryPolicy, Transport};

/// Lifecycle state reported in the job listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobState {
    Running,
    Finished,
    Other(String),
}

impl JobState {
    pub fn parse(state: &str) -> Self {
        match state {
            "RUNNING" => JobState::Running,
            "FINISHED" => JobState::Finished,
            other => JobState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Running => "RUNNING",
            JobState::Finished => "FINISHED",
            JobState::Other(s) => s,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view over one raw listing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    pub state: JobState,
}

impl JobSummary {
    /// Reads `jid`, `name` and `state`; a record without `jid` has no summary
    pub fn from_raw(record: &Value) -> Option<Self> {
        let id = record.get("jid")?.as_str()?.to_string();
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let state = JobState::parse(record.get("state").and_then(Value::as_str).unwrap_or(""));

        Some(Self { id, name, state })
    }
}

/// An uploaded jar as listed by `GET /jars`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JarFile {
    pub id: String,
    pub name: String,
    pub entry: Vec<JarEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JarEntry {
    pub name: String,
}

impl JarFile {
    pub fn first_entry_class(&self) -> Option<&str> {
        self.entry.first().map(|e| e.name.as_str()).filter(|n| !n.is_empty())
    }
}

/// Reply to a launch request
#[derive(Debug, Clone, Serialize)]
pub struct LaunchResponse {
    pub job_id: Option<String>,
    pub raw: Value,
}

/// Control plane client built on the retrying request executor
#[derive(Clone)]
pub struct ControlPlaneClient {
    executor: RequestExecutor,
    source_address: String,
}

impl ControlPlaneClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, source_address: &str) -> Self {
        Self {
            executor: RequestExecutor::new(transport, policy),
            source_address: source_address.to_string(),
        }
    }

    /// Address recorded in snapshots taken from this client
    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Raw records from `GET /jobs/overview`
    pub async fn list_jobs(&self) -> Result<Vec<Value>> {
        let response = self
            .executor
            .get("/jobs/overview")
            .await
            .context("Failed to fetch job overview")?;

        let jobs = match response.get("jobs") {
            Some(Value::Array(jobs)) => jobs.clone(),
            _ => bail!("Job overview response has no 'jobs' list"),
        };

        info!("Retrieved {} jobs from {}", jobs.len(), self.source_address);
        Ok(jobs)
    }

    pub async fn job_config(&self, job_id: &str) -> Result<Value> {
        ensure_job_id(job_id)?;
        self.executor
            .get(&format!("/jobs/{}/config", job_id))
            .await
            .with_context(|| format!("Failed to fetch config for job {}", job_id))
    }

    pub async fn job_checkpoints(&self, job_id: &str) -> Result<Value> {
        ensure_job_id(job_id)?;
        self.executor
            .get(&format!("/jobs/{}/checkpoints", job_id))
            .await
            .with_context(|| format!("Failed to fetch checkpoints for job {}", job_id))
    }

    /// `POST /jobs/{job_id}/stop`, stopping the job without a savepoint
    pub async fn stop_job(&self, job_id: &str) -> Result<Value> {
        ensure_job_id(job_id)?;
        self.executor
            .post(&format!("/jobs/{}/stop", job_id), &json!({}))
            .await
            .with_context(|| format!("Failed to stop job {}", job_id))
    }

    /// Uploaded jars from `GET /jars`
    pub async fn list_jars(&self) -> Result<Vec<JarFile>> {
        let response = self.executor.get("/jars").await.context("Failed to list jars")?;
        let files = response.get("files").cloned().unwrap_or(Value::Array(Vec::new()));
        let jars: Vec<JarFile> = serde_json::from_value(files).context("Malformed jar listing")?;
        Ok(jars)
    }

    pub async fn jar_detail(&self, jar_id: &str) -> Result<JarFile> {
        let response = self
            .executor
            .get(&format!("/jars/{}", jar_id))
            .await
            .with_context(|| format!("Failed to fetch jar {}", jar_id))?;

        let mut detail: JarFile = match serde_json::from_value(response) {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Malformed detail for jar {}, ignoring it: {}", jar_id, e);
                JarFile::default()
            }
        };
        if detail.id.is_empty() {
            detail.id = jar_id.to_string();
        }
        Ok(detail)
    }

    /// `POST /jars/{jar_id}/run`, reading back the new job id when present
    pub async fn run_jar(&self, jar_id: &str, body: &Value) -> Result<LaunchResponse, RequestError> {
        let raw = self.executor.post(&format!("/jars/{}/run", jar_id), body).await?;
        let job_id = raw.get("jobid").and_then(Value::as_str).map(str::to_string);

        if let Some(id) = &job_id {
            info!("Jar {} launched new job {}", jar_id, id);
        }

        Ok(LaunchResponse { job_id, raw })
    }
}

fn ensure_job_id(job_id: &str) -> Result<()> {
    if job_id.trim().is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }
    Ok(())
}
