//! Selection of jobs from a raw listing

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::info;

use super::control_plane::{JobState, JobSummary};

/// Criteria applied to listing records, in field order
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub job_id: Option<String>,
    /// Exact name, or an unanchored pattern when it contains `*`
    pub name_pattern: Option<String>,
    pub field: Option<(String, String)>,
    pub state: Option<JobState>,
}

impl JobFilter {
    /// Filter that keeps only jobs in `state`
    pub fn in_state(state: JobState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    /// Parses a `KEY=VALUE` field condition, splitting on the first `=`
    pub fn parse_field(condition: &str) -> Result<(String, String)> {
        match condition.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => bail!("Invalid filter '{}', expected KEY=VALUE", condition),
        }
    }

    pub fn matches(&self, record: &Value) -> bool {
        if let Some(job_id) = &self.job_id {
            if record.get("jid").and_then(Value::as_str) != Some(job_id.as_str()) {
                return false;
            }
        }

        if let Some(pattern) = &self.name_pattern {
            let name = record.get("name").and_then(Value::as_str).unwrap_or("");
            if !name_matches(pattern, name) {
                return false;
            }
        }

        if let Some((key, expected)) = &self.field {
            match record.get(key) {
                Some(value) if &render(value) == expected => {}
                _ => return false,
            }
        }

        if let Some(state) = &self.state {
            let actual = record.get("state").and_then(Value::as_str).unwrap_or("");
            if actual != state.as_str() {
                return false;
            }
        }

        true
    }

    /// Keeps the matching records
    pub fn apply(&self, records: &[Value]) -> Vec<Value> {
        let selected: Vec<Value> = records.iter().filter(|r| self.matches(r)).cloned().collect();
        info!("Filter kept {} of {} jobs", selected.len(), records.len());
        selected
    }

    /// Ids of the matching records, in listing order
    pub fn select_ids(&self, records: &[Value]) -> Vec<String> {
        self.apply(records)
            .iter()
            .filter_map(JobSummary::from_raw)
            .map(|summary| summary.id)
            .collect()
    }
}

/// `*` matches any run of characters; the pattern may match anywhere in the name
fn name_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }

    let mut rest = name;
    for piece in pattern.split('*').filter(|p| !p.is_empty()) {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    true
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
