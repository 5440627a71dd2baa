use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ttl::TtlTable;
use super::types::*;

/// Pulls statement fragments, pipeline name and TTL out of a job config document
#[derive(Debug, Clone)]
pub struct ConfigExtractor {
    ttl_table: Arc<TtlTable>,
}

impl ConfigExtractor {
    pub fn new(ttl_table: Arc<TtlTable>) -> Self {
        Self { ttl_table }
    }

    /// Extracts from the `execution-config.user-config` section.
    ///
    /// A document without that section yields an empty result, not an error.
    pub fn extract(&self, document: &Value) -> ExtractedConfig {
        let mut result = ExtractedConfig::default();

        let Some(user_config) = user_config(document) else {
            warn!("Job config has no execution-config.user-config section");
            return result;
        };

        result.ddl = self.read_fragment(user_config, DDL_KEY, &mut result.warnings);
        result.sql = self.read_fragment(user_config, SQL_KEY, &mut result.warnings);
        result.pipeline_name = user_config.get(PIPELINE_NAME_KEY).map(value_to_string);
        result.ttl = self.resolve_ttl(result.pipeline_name.as_deref(), user_config);

        if result.is_empty() {
            warn!("No {} or {} statements found", DDL_KEY, SQL_KEY);
        }

        result
    }

    fn read_fragment(
        &self,
        user_config: &Map<String, Value>,
        key: &str,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Option<Fragment> {
        let raw = user_config.get(key)?;

        let fragment = match raw {
            Value::String(s) if looks_like_json(s) => match serde_json::from_str::<Value>(s) {
                Ok(decoded) => Fragment::from_value(decoded),
                Err(e) => {
                    warn!("Could not decode {} as JSON, keeping raw string: {}", key, e);
                    warnings.push(ExtractionWarning {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                    Fragment::Raw(s.clone())
                }
            },
            Value::String(s) => Fragment::Raw(s.clone()),
            structured => Fragment::from_value(structured.clone()),
        };

        info!("Extracted {} with {} statement(s)", key, fragment.statement_count());
        Some(fragment)
    }

    /// Table entry for the pipeline name first, then the document's own setting
    fn resolve_ttl(&self, pipeline_name: Option<&str>, user_config: &Map<String, Value>) -> Option<String> {
        if let Some(ttl) = pipeline_name.and_then(|name| self.ttl_table.lookup(name)) {
            debug!("TTL {} taken from table for pipeline {:?}", ttl, pipeline_name);
            return Some(ttl.to_string());
        }

        let embedded = user_config.get(TTL_KEY).map(value_to_string);
        match &embedded {
            Some(ttl) => debug!("TTL {} taken from job config", ttl),
            None => debug!("No TTL configured"),
        }
        embedded
    }
}

impl Default for ConfigExtractor {
    fn default() -> Self {
        Self::new(TtlTable::builtin())
    }
}

fn user_config(document: &Value) -> Option<&Map<String, Value>> {
    document
        .get("execution-config")?
        .get("user-config")?
        .as_object()
}

fn looks_like_json(s: &str) -> bool {
    s.starts_with('[') || s.starts_with('"')
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
