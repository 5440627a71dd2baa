use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User-config key holding the DDL statement list
pub const DDL_KEY: &str = "marketing.ddl";
/// User-config key holding the SQL statement list
pub const SQL_KEY: &str = "marketing.sql";
/// User-config key holding the pipeline name
pub const PIPELINE_NAME_KEY: &str = "pipeline.name";
/// User-config key holding the state retention setting
pub const TTL_KEY: &str = "table.exec.state.ttl";

/// A configuration fragment as it was found in the job document
///
/// Serializes without a tag, so a fragment writes back exactly the JSON shape
/// it was read as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    /// Ordered statement list, decoded from a string or given as a JSON array
    Statements(Vec<String>),
    /// String kept verbatim: not JSON-looking, or failed to decode
    Raw(String),
    /// Any other structured value, passed through untouched
    Structured(Value),
}

impl Fragment {
    /// Classifies an already-decoded JSON value
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => Fragment::Raw(s),
            Value::Array(items) if items.iter().all(Value::is_string) => Fragment::Statements(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Fragment::Structured(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Fragment::Statements(statements) => statements.is_empty(),
            Fragment::Raw(s) => s.is_empty(),
            Fragment::Structured(value) => match value {
                Value::Null => true,
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            },
        }
    }

    /// Number of statements, counting a verbatim string as one
    pub fn statement_count(&self) -> usize {
        match self {
            Fragment::Statements(statements) => statements.len(),
            Fragment::Raw(s) if s.is_empty() => 0,
            Fragment::Raw(_) => 1,
            Fragment::Structured(Value::Array(items)) => items.len(),
            Fragment::Structured(_) => 1,
        }
    }
}

/// A fragment that looked like JSON but could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    pub key: String,
    pub reason: String,
}

/// Settings pulled out of a job configuration document
///
/// The serialized form is the program-argument payload handed to a relaunched
/// query job; absent fields are omitted rather than written as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedConfig {
    #[serde(rename = "marketing.ddl", default, skip_serializing_if = "Option::is_none")]
    pub ddl: Option<Fragment>,

    #[serde(rename = "marketing.sql", default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<Fragment>,

    #[serde(rename = "pipeline.name", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,

    #[serde(rename = "table.exec.state.ttl", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,

    #[serde(skip)]
    pub warnings: Vec<ExtractionWarning>,
}

impl ExtractedConfig {
    /// True when at least one of the DDL or SQL fragments is present and non-empty
    pub fn has_statements(&self) -> bool {
        let usable = |fragment: &Option<Fragment>| fragment.as_ref().is_some_and(|f| !f.is_empty());
        usable(&self.ddl) || usable(&self.sql)
    }

    /// True when nothing usable for a query relaunch was found
    pub fn is_empty(&self) -> bool {
        !self.has_statements()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragment_from_value() {
        assert_eq!(
            Fragment::from_value(json!(["a", "b"])),
            Fragment::Statements(vec!["a".into(), "b".into()])
        );
        assert_eq!(Fragment::from_value(json!("x")), Fragment::Raw("x".into()));
        assert_eq!(
            Fragment::from_value(json!([1, "b"])),
            Fragment::Structured(json!([1, "b"]))
        );
    }

    #[test]
    fn test_fragment_emptiness() {
        assert!(Fragment::Statements(vec![]).is_empty());
        assert!(Fragment::Raw(String::new()).is_empty());
        assert!(Fragment::Structured(json!({})).is_empty());
        assert!(!Fragment::Raw("SELECT 1".into()).is_empty());
    }

    #[test]
    fn test_serialized_key_order_and_omission() {
        let config = ExtractedConfig {
            ddl: Some(Fragment::Statements(vec!["CREATE TABLE t".into()])),
            sql: None,
            pipeline_name: Some("p".into()),
            ttl: Some("8".into()),
            warnings: vec![],
        };
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            r#"{"marketing.ddl":["CREATE TABLE t"],"pipeline.name":"p","table.exec.state.ttl":"8"}"#
        );
    }
}
