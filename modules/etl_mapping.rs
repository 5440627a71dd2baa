//! Job name to ETL artifact mapping
//!
//! ETL jobs carry no embedded statements; the prebuilt artifact they run is
//! identified from the job's display name. Lookup precedence:
//! 1. exact key match
//! 2. the name extends a key by extra `_` segments (`salary_job_2` -> `salary_job`)
//! 3. the reserved bare name that stands for a default variant
//! 4. a key contained anywhere in the name

use serde::Serialize;
use std::sync::{Arc, LazyLock};

const SEGMENT_DELIMITER: char = '_';

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub key: String,
    pub description: String,
    pub artifact: String,
}

impl MappingEntry {
    pub fn new(key: &str, description: &str, artifact: &str) -> Self {
        Self {
            key: key.to_string(),
            description: description.to_string(),
            artifact: artifact.to_string(),
        }
    }

    fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            description: self.description.clone(),
            canonical_key: self.key.clone(),
            artifact_file_name: self.artifact.clone(),
        }
    }
}

/// Resolved artifact for an ETL job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub description: String,
    pub canonical_key: String,
    pub artifact_file_name: String,
}

impl ArtifactInfo {
    /// Renders the `"{description} {key} |{artifact}"` label stored in ETL descriptors
    pub fn label(&self) -> String {
        format!(
            "{} {} |{}",
            self.description, self.canonical_key, self.artifact_file_name
        )
    }

    /// Parses a label produced by [`ArtifactInfo::label`]
    pub fn parse_label(label: &str) -> Option<Self> {
        let (head, artifact) = label.rsplit_once('|')?;
        let (description, key) = head.trim_end().rsplit_once(' ')?;
        let artifact = artifact.trim();

        if key.is_empty() || artifact.is_empty() {
            return None;
        }

        Some(Self {
            description: description.trim().to_string(),
            canonical_key: key.to_string(),
            artifact_file_name: artifact.to_string(),
        })
    }
}

/// Which lookup rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    SegmentSuffix,
    ReservedName,
    Substring,
}

/// Read-only name to artifact table
#[derive(Debug, Clone)]
pub struct EtlMapping {
    entries: Vec<MappingEntry>,
    /// Bare name and the key it defaults to
    reserved: Option<(String, String)>,
}

static BUILTIN: LazyLock<Arc<EtlMapping>> = LazyLock::new(|| Arc::new(EtlMapping::load_builtin()));

impl EtlMapping {
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        Self {
            entries,
            reserved: None,
        }
    }

    /// Makes `name` resolve to the entry stored under `target`
    pub fn with_reserved(mut self, name: &str, target: &str) -> Self {
        self.reserved = Some((name.to_string(), target.to_string()));
        self
    }

    /// The process-wide table, built once on first use
    pub fn builtin() -> Arc<EtlMapping> {
        BUILTIN.clone()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn resolve_artifact(&self, name: &str) -> Option<ArtifactInfo> {
        self.find(name).map(|(entry, _)| entry.info())
    }

    pub fn is_known_family(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Looks a name up and reports the rule that matched.
    ///
    /// Within the segment-suffix rule the longest key wins, so a name never
    /// resolves to a key that is only a shorter prefix of a better match. The
    /// substring rule takes the first key in table order.
    pub fn find(&self, name: &str) -> Option<(&MappingEntry, MatchRule)> {
        if name.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.iter().find(|e| e.key == name) {
            return Some((entry, MatchRule::Exact));
        }

        let segments: Vec<&str> = name.split(SEGMENT_DELIMITER).collect();
        let mut best: Option<(&MappingEntry, usize)> = None;
        for entry in &self.entries {
            let key_segments: Vec<&str> = entry.key.split(SEGMENT_DELIMITER).collect();
            let extends_key = segments.len() > key_segments.len()
                && segments[..key_segments.len()] == key_segments[..];
            if extends_key && best.map_or(true, |(_, len)| key_segments.len() > len) {
                best = Some((entry, key_segments.len()));
            }
        }
        if let Some((entry, _)) = best {
            return Some((entry, MatchRule::SegmentSuffix));
        }

        if let Some((reserved, target)) = &self.reserved {
            if name == reserved {
                if let Some(entry) = self.entries.iter().find(|e| &e.key == target) {
                    return Some((entry, MatchRule::ReservedName));
                }
            }
        }

        self.entries
            .iter()
            .find(|e| name.contains(e.key.as_str()))
            .map(|entry| (entry, MatchRule::Substring))
    }

    fn load_builtin() -> Self {
        let rows = [
            ("etl_marketing_job", "Account source", "etl-marketing-flink-ETLMarketingTask-1.0-SNAPSHOT.jar"),
            ("pattern_etl_marketing_job", "TP source", "pattern_etl_marketing_job.jar"),
            ("game_job_1", "Game 1 source", "game-job1-6.1-SNAPSHOT.jar"),
            ("game_job_2", "Game 2 source", "game-job2-db.jar"),
            ("mic_etl_kafka_job", "Mic slot source", "etl-mic-1.0-SNAPSHOT.jar"),
            ("talent_etl_job", "Talent source", "talent_etl_job.jar"),
            ("user_behavior_job", "User source", "user_behavior-4.0-SNAPSHOT.jar"),
            ("analysis_user_job", "User analysis", "analysis_user_job.jar"),
            ("analysis_order_job", "Order recharge", "analysis_order_job.jar"),
            ("mission_job", "Mission source (base missions)", "mission_job.jar"),
            ("user_mission_job", "Mission source (platform completion sync)", "user_mission_job.jar"),
            ("activity_risk_control", "Activity risk control", "ActivityInspect-1.0-SNAPSHOT.jar"),
            ("history_rate_job", "Historical rating", "history-rate-1.0-SNAPSHOT.jar"),
            ("active_user_job", "Active users", "active_user_info.jar"),
            ("reel_operation_job", "Reel operations", "reel-1.0-SNAPSHOT.jar"),
            ("salary_job", "Payroll", "salary-flink-SalaryJob-1.0.0.jar"),
            ("app1_operation_etl_job", "App1 account source", "app1-etl-operation-flink-ETLTask-1.0-SNAPSHOT.jar"),
            ("app1_analysis_job", "App1 user and order source", "app1-analysis-1.0-SNAPSHOT.jar"),
            ("app1_user_behavior_job", "App1 user activity source", "app1-user_behavior-1.0-SNAPSHOT.jar"),
            ("game_total_job", "All games source", "game_total_job-SNAPSHOT.jar"),
            ("mission_etl_job", "All missions source", "mission_etl_job-1.0-SNAPSHOT.jar"),
            ("common_etl_job", "Other sources", "common_etl_job-1.0-SNAPSHOT.jar"),
        ];

        EtlMapping::new(
            rows.iter()
                .map(|(key, description, artifact)| MappingEntry::new(key, description, artifact))
                .collect(),
        )
        .with_reserved("game_job", "game_job_1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_returns_entry_verbatim() {
        let mapping = EtlMapping::builtin();
        let info = mapping.resolve_artifact("salary_job").unwrap();

        assert_eq!(info.description, "Payroll");
        assert_eq!(info.canonical_key, "salary_job");
        assert_eq!(info.artifact_file_name, "salary-flink-SalaryJob-1.0.0.jar");
        assert_eq!(info.label(), "Payroll salary_job |salary-flink-SalaryJob-1.0.0.jar");
    }

    #[test]
    fn test_every_builtin_key_resolves_to_itself() {
        let mapping = EtlMapping::builtin();
        for entry in mapping.entries() {
            let (found, rule) = mapping.find(&entry.key).unwrap();
            assert_eq!(found, entry);
            assert_eq!(rule, MatchRule::Exact);
        }
    }

    #[test]
    fn test_numeric_suffix_resolves_to_base_key() {
        let mapping = EtlMapping::builtin();
        let (entry, rule) = mapping.find("salary_job_2").unwrap();
        assert_eq!(entry.key, "salary_job");
        assert_eq!(rule, MatchRule::SegmentSuffix);

        let (entry, _) = mapping.find("user_mission_job_3").unwrap();
        assert_eq!(entry.key, "user_mission_job");
    }

    #[test]
    fn test_suffix_prefers_longest_key() {
        let mapping = EtlMapping::new(vec![
            MappingEntry::new("base", "short", "short.jar"),
            MappingEntry::new("base_task", "long", "long.jar"),
        ]);
        let info = mapping.resolve_artifact("base_task_1").unwrap();
        assert_eq!(info.canonical_key, "base_task");
        assert_eq!(info.description, "long");
    }

    #[test]
    fn test_reserved_name_defaults_to_first_variant() {
        let mapping = EtlMapping::builtin();
        let (entry, rule) = mapping.find("game_job").unwrap();
        assert_eq!(entry.key, "game_job_1");
        assert_eq!(rule, MatchRule::ReservedName);
        assert!(mapping.is_known_family("game_job"));
    }

    #[test]
    fn test_substring_match() {
        let mapping = EtlMapping::builtin();
        let (entry, rule) = mapping.find("prod_talent_etl_job").unwrap();
        assert_eq!(entry.key, "talent_etl_job");
        assert_eq!(rule, MatchRule::Substring);
    }

    #[test]
    fn test_substring_takes_first_key_in_table_order() {
        let mapping = EtlMapping::builtin();
        let (entry, rule) = mapping.find("sem_user_mission_job").unwrap();
        assert_eq!(entry.key, "mission_job");
        assert_eq!(rule, MatchRule::Substring);

        let info = mapping.resolve_artifact("prod_pattern_etl_marketing_job").unwrap();
        assert_eq!(info.canonical_key, "etl_marketing_job");
        assert_eq!(
            info.artifact_file_name,
            "etl-marketing-flink-ETLMarketingTask-1.0-SNAPSHOT.jar"
        );

        let reordered = EtlMapping::new(vec![
            MappingEntry::new("user_mission_job", "long", "long.jar"),
            MappingEntry::new("mission_job", "short", "short.jar"),
        ]);
        assert_eq!(
            reordered.resolve_artifact("sem_user_mission_job").unwrap().canonical_key,
            "user_mission_job"
        );
    }

    #[test]
    fn test_unregistered_name() {
        let mapping = EtlMapping::builtin();
        assert!(!mapping.is_known_family("unregistered_name_xyz"));
        assert!(mapping.resolve_artifact("unregistered_name_xyz").is_none());
        assert!(!mapping.is_known_family(""));
    }

    #[test]
    fn test_label_round_trip_with_spaces_in_description() {
        let info = EtlMapping::builtin().resolve_artifact("mission_job").unwrap();
        let parsed = ArtifactInfo::parse_label(&info.label()).unwrap();
        assert_eq!(parsed, info);
        assert!(ArtifactInfo::parse_label("").is_none());
        assert!(ArtifactInfo::parse_label("no separator here").is_none());
    }
}
