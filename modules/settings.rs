//! Runtime settings with built-in defaults
//!
//! Settings start from the defaults below and can be overridden by a JSON
//! file whose objects merge key by key into the defaults:
//!
//! ```json
//! {
//!   "api": { "base_url": "http://flink:8081", "timeout_secs": 30 },
//!   "batch": { "size": 8 },
//!   "launch": { "common_jar_id": "abc_common-flink-job.jar" }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use super::request_executor::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Concurrent workers
    pub size: usize,
    /// Attempts per request, including the first
    pub retry_count: u32,
    pub retry_delay_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 5,
            retry_count: 3,
            retry_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub query_file: PathBuf,
    pub etl_file: PathBuf,
    pub snapshot_dir: PathBuf,
    pub report_file: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            query_file: PathBuf::from("output/processed_jobs.json"),
            etl_file: PathBuf::from("output/etl_jobs.json"),
            snapshot_dir: PathBuf::from("output/raw_data"),
            report_file: PathBuf::from("output/run_report.md"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Jar that runs every query job
    pub common_jar_id: String,
    pub query_interval_secs: u64,
    pub etl_interval_secs: u64,
    pub stop_interval_secs: u64,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            common_jar_id: "example-jar-id_common-flink-job.jar".to_string(),
            query_interval_secs: 10,
            etl_interval_secs: 5,
            stop_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub batch: BatchSettings,
    pub output: OutputSettings,
    pub launch: LaunchSettings,
}

impl Settings {
    /// Defaults, overlaid with `path` when given.
    ///
    /// A missing, unreadable or malformed file is logged and the defaults are
    /// kept.
    pub fn load(path: Option<&Path>) -> Self {
        let defaults = Settings::default();
        let Some(path) = path else {
            return defaults;
        };

        match Self::merge_file(&defaults, path) {
            Ok(settings) => {
                info!("Loaded configuration from {}", path.display());
                settings
            }
            Err(e) => {
                error!("Failed to load configuration file: {:#}", e);
                defaults
            }
        }
    }

    fn merge_file(base: &Settings, path: &Path) -> Result<Settings> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let overrides: Value =
            serde_json::from_str(&content).with_context(|| format!("Malformed JSON in {}", path.display()))?;

        let mut merged = serde_json::to_value(base).context("Failed to serialize default settings")?;
        deep_merge(&mut merged, overrides);
        serde_json::from_value(merged).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.batch.retry_count.max(1),
            delay: Duration::from_secs(self.batch.retry_delay_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

/// Objects merge key by key; anything else replaces the base value
pub fn deep_merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => deep_merge(existing, value),
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
