//! Timestamped job listing snapshots for offline replay

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const FILE_PREFIX: &str = "raw_jobs_";
const FILE_SUFFIX: &str = ".json";

/// A persisted job listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    #[serde(rename = "api_url", default = "unknown_source")]
    pub source_address: String,
    #[serde(default)]
    pub jobs: Vec<Value>,
}

/// What a snapshot listing reports about each file
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMeta {
    pub timestamp: String,
    pub path: PathBuf,
    pub jobs_count: usize,
    pub source_address: String,
}

fn unknown_source() -> String {
    "unknown".to_string()
}

/// Directory of `raw_jobs_{timestamp}.json` files
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a snapshot stamped with the current local time and returns its id
    pub fn record(&self, source_address: &str, jobs: &[Value]) -> Result<String> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.record_as(&timestamp, source_address, jobs)
    }

    /// Writes a snapshot under an explicit `YYYYMMDD_HHMMSS` id
    pub fn record_as(&self, timestamp: &str, source_address: &str, jobs: &[Value]) -> Result<String> {
        if !is_valid_timestamp(timestamp) {
            bail!("Invalid snapshot timestamp '{}', expected YYYYMMDD_HHMMSS", timestamp);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create snapshot directory {}", self.dir.display()))?;

        let snapshot = Snapshot {
            timestamp: timestamp.to_string(),
            source_address: source_address.to_string(),
            jobs: jobs.to_vec(),
        };
        let path = self.path_for(timestamp);
        let content = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
        fs::write(&path, content).with_context(|| format!("Failed to write snapshot {}", path.display()))?;

        info!("Saved {} raw jobs to {}", jobs.len(), path.display());
        Ok(timestamp.to_string())
    }

    /// Readable snapshots, newest first
    pub fn list_snapshots(&self) -> Vec<SnapshotMeta> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => {
                info!("Snapshot directory {} does not exist", self.dir.display());
                return Vec::new();
            }
        };

        let mut snapshots: Vec<SnapshotMeta> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let timestamp = timestamp_from_file_name(&path)?;
                match read_snapshot(&path) {
                    Ok(snapshot) => Some(SnapshotMeta {
                        timestamp,
                        path,
                        jobs_count: snapshot.jobs.len(),
                        source_address: snapshot.source_address,
                    }),
                    Err(e) => {
                        warn!("Skipping unreadable snapshot {}: {:#}", path.display(), e);
                        None
                    }
                }
            })
            .collect();

        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        info!("Found {} snapshot(s) in {}", snapshots.len(), self.dir.display());
        snapshots
    }

    /// Loads the named snapshot, or the newest one when no id is given.
    ///
    /// Returns `None` when nothing suitable exists or the file cannot be parsed.
    pub fn load(&self, timestamp: Option<&str>) -> Option<Snapshot> {
        let path = match timestamp {
            Some(ts) => {
                if !is_valid_timestamp(ts) {
                    error!("Invalid snapshot timestamp '{}', expected YYYYMMDD_HHMMSS", ts);
                    return None;
                }
                let path = self.path_for(ts);
                if !path.exists() {
                    error!("Requested snapshot does not exist: {}", path.display());
                    return None;
                }
                path
            }
            None => match self.list_snapshots().into_iter().next() {
                Some(newest) => newest.path,
                None => {
                    error!("No snapshots available in {}", self.dir.display());
                    return None;
                }
            },
        };

        match read_snapshot(&path) {
            Ok(snapshot) => {
                info!(
                    "Loaded snapshot {} from {} with {} jobs",
                    snapshot.timestamp,
                    snapshot.source_address,
                    snapshot.jobs.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                error!("Failed to load snapshot {}: {:#}", path.display(), e);
                None
            }
        }
    }

    fn path_for(&self, timestamp: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", FILE_PREFIX, timestamp, FILE_SUFFIX))
    }
}

pub fn is_valid_timestamp(timestamp: &str) -> bool {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok()
}

fn timestamp_from_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let timestamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    is_valid_timestamp(timestamp).then(|| timestamp.to_string())
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Malformed snapshot {}", path.display()))
}
