//! Relaunches jobs from previously written descriptor files
//!
//! Query descriptors are posted as-is to the shared query jar. ETL descriptors
//! name an artifact, which is matched against the uploaded jars to find the
//! jar id and its entry class before launching.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::control_plane::{ControlPlaneClient, JarFile};
use super::etl_mapping::{ArtifactInfo, EtlMapping};
use super::job_processor::{EtlJobDescriptor, QueryJobDescriptor};

// Constants
pub const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_ETL_INTERVAL: Duration = Duration::from_secs(5);

/// Jar name fragments (lowercase) and the entry class their jars use
const ENTRY_CLASS_HINTS: &[(&str, &str)] = &[
    ("salary-flink-salaryjob", "com.quick.salary.job.SalaryJob"),
    ("sem_user_mission_job", "com.quick.ta.task.TaTask"),
    ("user_mission_job", "com.quick.ta.task.TaTask"),
    ("reel", "com.quick.ta.task.TaTask"),
    ("history-rate", "com.quick.ta.task.TaTask"),
    ("active_user_info", "com.quick.ta.task.TaTask"),
    ("game-job", "com.quick.ta.task.TaTask"),
    ("user_behavior", "com.quick.ta.task.TaTask"),
    ("talent_etl_job", "com.quick.ta.task.TaTask"),
    ("analysis", "com.quick.ta.task.TaTask"),
    ("etl-marketing-flink", "com.quick.etl.marketing.task.ETLMarketingTask"),
    ("pattern_etl_marketing_job", "com.quick.etl.marketing.task.ETLMarketingTask"),
    ("etl-mic", "com.quick.etl.marketing.task.ETLMarketingTask"),
    ("activityinspect", "com.quick.ActivityInspect"),
    ("marketing-flink-marketingsqltask", "com.quick.marketing.MarketingSQLTask"),
];

/// Guesses an entry class from a jar file name
pub fn infer_entry_class(jar_name: &str) -> Option<&'static str> {
    let lower = jar_name.to_lowercase();
    ENTRY_CLASS_HINTS
        .iter()
        .find(|(fragment, _)| lower.contains(fragment))
        .map(|(_, class)| *class)
}

/// Which descriptor entries to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchSelection {
    All,
    /// Matched against the whole key, its job id part or its name part
    Only(Vec<String>),
}

impl LaunchSelection {
    /// Parses a comma separated list
    pub fn parse(list: &str) -> Self {
        LaunchSelection::Only(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn selects(&self, key: &str) -> bool {
        match self {
            LaunchSelection::All => true,
            LaunchSelection::Only(wanted) => {
                let (id, name) = split_key(key);
                wanted.iter().any(|w| w == key || w == id || w == name)
            }
        }
    }
}

/// `"{job_id}-{name}"`; job ids never contain `-`, names may
pub fn split_key(key: &str) -> (&str, &str) {
    key.split_once('-').unwrap_or((key, key))
}

/// Outcome of a single launch
#[derive(Debug, Clone, Serialize)]
pub struct LaunchResult {
    pub key: String,
    pub success: bool,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LaunchReport {
    pub planned: usize,
    pub dry_run: bool,
    pub results: Vec<LaunchResult>,
}

impl LaunchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// 0 when every launch succeeded (or nothing was launched), 2 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() == self.results.len() {
            0
        } else {
            2
        }
    }
}

/// An uploaded jar matched to an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJar {
    pub id: String,
    pub name: String,
    pub entry_class: Option<String>,
}

pub struct Launcher {
    client: ControlPlaneClient,
    mapping: Arc<EtlMapping>,
    interval: Duration,
    dry_run: bool,
}

impl Launcher {
    pub fn new(client: ControlPlaneClient, mapping: Arc<EtlMapping>) -> Self {
        Self {
            client,
            mapping,
            interval: DEFAULT_QUERY_INTERVAL,
            dry_run: false,
        }
    }

    /// Pause between consecutive launches
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    // === Query Jobs ===

    pub async fn launch_queries(
        &self,
        common_jar_id: &str,
        entries: &BTreeMap<String, QueryJobDescriptor>,
        selection: &LaunchSelection,
    ) -> LaunchReport {
        let selected: Vec<(&String, &QueryJobDescriptor)> =
            entries.iter().filter(|(key, _)| selection.selects(key)).collect();
        let mut report = self.new_report(selected.len());
        info!("Launching {} query job(s) with jar {}", selected.len(), common_jar_id);

        if self.dry_run {
            for (i, (key, descriptor)) in selected.iter().enumerate() {
                info!(
                    "[{}/{}] Would launch {} (savepoint: {})",
                    i + 1,
                    selected.len(),
                    key,
                    descriptor.savepoint_path.as_deref().unwrap_or("none")
                );
            }
            return report;
        }

        for (i, (key, descriptor)) in selected.iter().enumerate() {
            info!("[{}/{}] Launching query job {}", i + 1, selected.len(), key);
            let result = match serde_json::to_value(descriptor) {
                Ok(body) => self
                    .client
                    .run_jar(common_jar_id, &body)
                    .await
                    .map(|response| response.job_id)
                    .map_err(anyhow::Error::from),
                Err(e) => Err(anyhow!(e)),
            };
            report.results.push(finish(key, result));
            self.pause_between(i, selected.len()).await;
        }

        log_totals(&report);
        report
    }

    // === ETL Jobs ===

    pub async fn launch_etl(
        &self,
        entries: &BTreeMap<String, EtlJobDescriptor>,
        selection: &LaunchSelection,
    ) -> LaunchReport {
        let selected: Vec<(&String, &EtlJobDescriptor)> =
            entries.iter().filter(|(key, _)| selection.selects(key)).collect();
        let mut report = self.new_report(selected.len());
        info!("Launching {} ETL job(s)", selected.len());

        if self.dry_run {
            for (i, (key, descriptor)) in selected.iter().enumerate() {
                info!(
                    "[{}/{}] Would launch {} (etl: {}, savepoint: {})",
                    i + 1,
                    selected.len(),
                    key,
                    descriptor.etl,
                    descriptor.savepoint.as_deref().unwrap_or("none")
                );
            }
            return report;
        }

        for (i, (key, descriptor)) in selected.iter().enumerate() {
            info!("[{}/{}] Launching ETL job {}", i + 1, selected.len(), key);
            let result = self.launch_etl_job(key, descriptor).await;
            report.results.push(finish(key, result));
            self.pause_between(i, selected.len()).await;
        }

        log_totals(&report);
        report
    }

    async fn launch_etl_job(&self, key: &str, descriptor: &EtlJobDescriptor) -> Result<Option<String>> {
        let artifact = self
            .etl_artifact(key, descriptor)
            .ok_or_else(|| anyhow!("No artifact known for {}", key))?;
        let jar = self.resolve_jar(&artifact.artifact_file_name).await?;
        info!("Using jar {} (id {}) for {}", jar.name, jar.id, key);

        let mut body = Map::new();
        match &jar.entry_class {
            Some(class) => {
                body.insert("entryClass".to_string(), json!(class));
            }
            None => warn!("No entry class found for jar {}, relying on its manifest", jar.name),
        }
        if let Some(savepoint) = &descriptor.savepoint {
            body.insert("savepointPath".to_string(), json!(savepoint));
        }

        let response = self.client.run_jar(&jar.id, &Value::Object(body)).await?;
        Ok(response.job_id)
    }

    /// The descriptor's label, or the mapping entry for the key's name part
    fn etl_artifact(&self, key: &str, descriptor: &EtlJobDescriptor) -> Option<ArtifactInfo> {
        if let Some(info) = ArtifactInfo::parse_label(&descriptor.etl) {
            return Some(info);
        }
        let (_, name) = split_key(key);
        warn!("Descriptor {} has no usable etl label, resolving {} again", key, name);
        self.mapping.resolve_artifact(name)
    }

    /// Finds the uploaded jar for an artifact file name, exact match first
    pub async fn resolve_jar(&self, artifact: &str) -> Result<ResolvedJar> {
        let jars = self.client.list_jars().await?;
        let jar = find_jar(&jars, artifact)
            .with_context(|| format!("No uploaded jar matches {}", artifact))?;

        let mut entry_class = jar.first_entry_class().map(str::to_string);
        if entry_class.is_none() {
            match self.client.jar_detail(&jar.id).await {
                Ok(detail) => entry_class = detail.first_entry_class().map(str::to_string),
                Err(e) => warn!("Could not read details of jar {}: {:#}", jar.id, e),
            }
        }
        if entry_class.is_none() {
            entry_class = infer_entry_class(&jar.name).map(str::to_string);
        }

        Ok(ResolvedJar {
            id: jar.id.clone(),
            name: jar.name.clone(),
            entry_class,
        })
    }

    fn new_report(&self, planned: usize) -> LaunchReport {
        LaunchReport {
            planned,
            dry_run: self.dry_run,
            results: Vec::new(),
        }
    }

    async fn pause_between(&self, index: usize, total: usize) {
        if index + 1 < total && !self.interval.is_zero() {
            info!("Waiting {:?} before the next launch", self.interval);
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn find_jar<'a>(jars: &'a [JarFile], artifact: &str) -> Option<&'a JarFile> {
    jars.iter()
        .find(|jar| jar.name == artifact)
        .or_else(|| jars.iter().find(|jar| jar.name.contains(artifact)))
        .filter(|jar| !jar.id.is_empty())
}

fn finish(key: &str, result: Result<Option<String>>) -> LaunchResult {
    match result {
        Ok(job_id) => {
            match &job_id {
                Some(id) => info!("Launched {} as job {}", key, id),
                None => info!("Launched {}", key),
            }
            LaunchResult {
                key: key.to_string(),
                success: true,
                job_id,
                error: None,
            }
        }
        Err(e) => {
            error!("Failed to launch {}: {:#}", key, e);
            LaunchResult {
                key: key.to_string(),
                success: false,
                job_id: None,
                error: Some(format!("{:#}", e)),
            }
        }
    }
}

fn log_totals(report: &LaunchReport) {
    info!("Launch finished: {}/{} succeeded", report.succeeded(), report.results.len());
}

/// Reads a descriptor file written by a processing run
pub fn load_entries<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let entries: BTreeMap<String, T> =
        serde_json::from_str(&content).with_context(|| format!("Malformed descriptor file {}", path.display()))?;
    info!("Loaded {} descriptor(s) from {}", entries.len(), path.display());
    Ok(entries)
}
