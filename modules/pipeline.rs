//! End-to-end processing run: select jobs, classify them, write the outputs

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::job_processor::{BatchResults, JobProcessor, MarkdownFormatter, RunContext};
use super::job_selection::JobFilter;
use super::snapshot::SnapshotStore;

/// Where the job ids of a run come from
#[derive(Debug, Clone, PartialEq)]
pub enum JobSource {
    /// Current listing from the control plane
    Live,
    /// A recorded listing; the newest when no timestamp is given
    Replay { timestamp: Option<String> },
    /// Ids given up front, no listing is fetched
    Explicit(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub source: JobSource,
    pub filter: JobFilter,
    /// Record the live listing before filtering it
    pub save_snapshot: bool,
    pub query_output: PathBuf,
    pub etl_output: PathBuf,
    pub report_output: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub selected: usize,
    pub results: BatchResults,
    pub snapshot_id: Option<String>,
    pub exit_code: i32,
}

/// 1 when nothing was selected or produced, 2 on partial failure, else 0
pub fn exit_code(selected: usize, results: &BatchResults) -> i32 {
    if selected == 0 || results.succeeded == 0 {
        1
    } else if results.failed > 0 {
        2
    } else {
        0
    }
}

pub struct Pipeline {
    processor: JobProcessor,
    snapshots: SnapshotStore,
}

impl Pipeline {
    pub fn new(processor: JobProcessor, snapshots: SnapshotStore) -> Self {
        Self { processor, snapshots }
    }

    pub async fn run(&self, request: &RunRequest) -> Result<RunSummary> {
        let (job_ids, context, snapshot_id) = self.select_jobs(request).await?;

        if job_ids.is_empty() {
            warn!("No jobs selected, nothing to process");
            return Ok(RunSummary {
                selected: 0,
                results: BatchResults::default(),
                snapshot_id,
                exit_code: 1,
            });
        }

        info!("Selected {} job(s) from {}", job_ids.len(), context.source);
        let results = self.processor.process_all(&job_ids).await;

        write_json(&request.query_output, &results.query).context("Failed to write query descriptors")?;
        info!("Wrote {} query descriptor(s) to {}", results.query.len(), request.query_output.display());
        write_json(&request.etl_output, &results.etl).context("Failed to write ETL descriptors")?;
        info!("Wrote {} ETL descriptor(s) to {}", results.etl.len(), request.etl_output.display());

        if let Some(report_path) = &request.report_output {
            let report = MarkdownFormatter::format_run_report(&context, &results);
            match write_text(report_path, &report) {
                Ok(()) => info!("Wrote run report to {}", report_path.display()),
                Err(e) => error!("Failed to write run report: {:#}", e),
            }
        }

        let exit_code = exit_code(job_ids.len(), &results);
        Ok(RunSummary {
            selected: job_ids.len(),
            results,
            snapshot_id,
            exit_code,
        })
    }

    async fn select_jobs(&self, request: &RunRequest) -> Result<(Vec<String>, RunContext, Option<String>)> {
        let client = self.processor.client();

        let (records, mode, source, snapshot_id) = match &request.source {
            JobSource::Explicit(ids) => {
                let context = RunContext {
                    mode: "explicit".to_string(),
                    source: client.source_address().to_string(),
                    selected: ids.len(),
                };
                return Ok((ids.clone(), context, None));
            }
            JobSource::Live => {
                let records = client.list_jobs().await.context("Failed to list jobs")?;
                let snapshot_id = if request.save_snapshot {
                    match self.snapshots.record(client.source_address(), &records) {
                        Ok(id) => Some(id),
                        Err(e) => {
                            warn!("Could not save raw job listing: {:#}", e);
                            None
                        }
                    }
                } else {
                    None
                };
                (records, "live", client.source_address().to_string(), snapshot_id)
            }
            JobSource::Replay { timestamp } => match self.snapshots.load(timestamp.as_deref()) {
                Some(snapshot) => {
                    info!("Replaying snapshot {} taken from {}", snapshot.timestamp, snapshot.source_address);
                    let source = format!("snapshot {} ({})", snapshot.timestamp, snapshot.source_address);
                    (snapshot.jobs, "replay", source, Some(snapshot.timestamp))
                }
                None => {
                    warn!("Replay requested but no snapshot is available");
                    (Vec::new(), "replay", "no snapshot".to_string(), None)
                }
            },
        };

        let job_ids = request.filter.select_ids(&records);
        let context = RunContext {
            mode: mode.to_string(),
            source,
            selected: job_ids.len(),
        };
        Ok((job_ids, context, snapshot_id))
    }
}

/// Pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    write_text(path, &content)
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::control_plane::{ControlPlaneClient, JobState};
    use crate::modules::job_processor::JobClassifier;
    use crate::modules::request_executor::RetryPolicy;
    use crate::modules::testing::FakeTransport;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn pipeline(transport: Arc<FakeTransport>, snapshot_dir: &Path) -> Pipeline {
        let client = ControlPlaneClient::new(
            transport,
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::ZERO,
            },
            "http://flink.test",
        );
        let processor = JobProcessor::new(client, JobClassifier::default());
        Pipeline::new(processor, SnapshotStore::new(snapshot_dir))
    }

    fn request(dir: &Path, source: JobSource) -> RunRequest {
        RunRequest {
            source,
            filter: JobFilter::in_state(JobState::Finished),
            save_snapshot: true,
            query_output: dir.join("out/processed_jobs.json"),
            etl_output: dir.join("out/etl_jobs.json"),
            report_output: Some(dir.join("out/run_report.md")),
        }
    }

    fn script_listing(transport: &FakeTransport) {
        transport.push_json(
            "/jobs/overview",
            &json!({"jobs": [
                {"jid": "q1", "name": "insert-into", "state": "FINISHED"},
                {"jid": "e1", "name": "salary_job_2", "state": "FINISHED"},
                {"jid": "r1", "name": "still_running", "state": "RUNNING"}
            ]}),
        );
        transport.push_json(
            "/jobs/q1/config",
            &json!({"name": "insert-into", "execution-config": {"user-config": {
                "marketing.sql": "[\"INSERT INTO t SELECT 1\"]",
                "pipeline.name": "weekly_gold_task"
            }}}),
        );
        transport.push_json("/jobs/q1/checkpoints", &json!({}));
        transport.push_json("/jobs/e1/config", &json!({"name": "salary_job_2"}));
        transport.push_json("/jobs/e1/checkpoints", &json!({}));
    }

    #[tokio::test]
    async fn test_live_run_writes_outputs_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        script_listing(&transport);

        let pipeline = pipeline(transport.clone(), &dir.path().join("raw"));
        let run = request(dir.path(), JobSource::Live);
        let summary = pipeline.run(&run).await.unwrap();

        assert_eq!(summary.selected, 2);
        assert_eq!(summary.exit_code, 0);
        assert_eq!(transport.call_count("/jobs/r1/config"), 0);

        let query: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(&run.query_output).unwrap()).unwrap();
        assert!(query.contains_key("q1-weekly_gold_task"));
        let etl: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(&run.etl_output).unwrap()).unwrap();
        assert!(etl.contains_key("e1-salary_job_2"));
        assert!(fs::read_to_string(dir.path().join("out/run_report.md"))
            .unwrap()
            .contains("Mode:** live"));

        let snapshot_id = summary.snapshot_id.unwrap();
        let snapshot = SnapshotStore::new(dir.path().join("raw")).load(Some(&snapshot_id)).unwrap();
        assert_eq!(snapshot.jobs.len(), 3);
        assert_eq!(snapshot.source_address, "http://flink.test");
    }

    #[tokio::test]
    async fn test_replay_uses_recorded_listing() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        script_listing(&transport);

        let store = SnapshotStore::new(dir.path().join("raw"));
        store
            .record_as(
                "20250101_000000",
                "http://old",
                &[json!({"jid": "e1", "name": "salary_job_2", "state": "FINISHED"})],
            )
            .unwrap();

        let pipeline = pipeline(transport.clone(), &dir.path().join("raw"));
        let summary = pipeline
            .run(&request(dir.path(), JobSource::Replay { timestamp: None }))
            .await
            .unwrap();

        assert_eq!(summary.selected, 1);
        assert_eq!(summary.snapshot_id.as_deref(), Some("20250101_000000"));
        assert_eq!(transport.call_count("/jobs/overview"), 0);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_an_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());

        let pipeline = pipeline(transport, &dir.path().join("raw"));
        let run = request(dir.path(), JobSource::Replay { timestamp: Some("20990101_000000".into()) });
        let summary = pipeline.run(&run).await.unwrap();

        assert_eq!(summary.selected, 0);
        assert_eq!(summary.exit_code, 1);
        assert!(!run.query_output.exists());
    }

    #[tokio::test]
    async fn test_explicit_ids_skip_listing_and_report_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        script_listing(&transport);

        let pipeline = pipeline(transport.clone(), &dir.path().join("raw"));
        let run = request(dir.path(), JobSource::Explicit(vec!["e1".into(), "gone".into()]));
        let summary = pipeline.run(&run).await.unwrap();

        assert_eq!(summary.selected, 2);
        assert_eq!(summary.results.failed, 1);
        assert_eq!(summary.exit_code, 2);
        assert_eq!(transport.call_count("/jobs/overview"), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new());
        transport.push("/jobs/overview", 401, "unauthorized");

        let pipeline = pipeline(transport, &dir.path().join("raw"));
        assert!(pipeline.run(&request(dir.path(), JobSource::Live)).await.is_err());
    }

    #[test]
    fn test_exit_codes() {
        let mut results = BatchResults {
            total: 2,
            succeeded: 2,
            ..Default::default()
        };
        assert_eq!(exit_code(2, &results), 0);
        results.succeeded = 1;
        results.failed = 1;
        assert_eq!(exit_code(2, &results), 2);
        results.succeeded = 0;
        assert_eq!(exit_code(2, &results), 1);
        assert_eq!(exit_code(0, &BatchResults::default()), 1);
    }
}
