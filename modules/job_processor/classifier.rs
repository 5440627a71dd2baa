//! Decides the job family and builds its launch descriptor

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::modules::checkpoint::resolve_resume_path;
use crate::modules::config_extractor::{ConfigExtractor, ExtractedConfig};
use crate::modules::etl_mapping::EtlMapping;

use super::types::*;

const UNKNOWN_NAME: &str = "unknown";

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("job {job_id}: config document is not a JSON object")]
    MalformedDocument { job_id: String },

    #[error("job {job_id} ({name}): no usable statements and no ETL mapping match")]
    NoUsableConfig { job_id: String, name: String },

    #[error("job {job_id}: failed to encode program arguments: {source}")]
    Encoding {
        job_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Classifies jobs as declarative query jobs or ETL jar jobs.
///
/// A job is ETL exactly when its working name matches the mapping, even if it
/// also carries statements. The working name is the extracted pipeline name,
/// then the document's `name`, then `"unknown"`.
#[derive(Debug, Clone)]
pub struct JobClassifier {
    extractor: ConfigExtractor,
    mapping: Arc<EtlMapping>,
}

impl JobClassifier {
    pub fn new(extractor: ConfigExtractor, mapping: Arc<EtlMapping>) -> Self {
        Self { extractor, mapping }
    }

    pub fn mapping(&self) -> &EtlMapping {
        &self.mapping
    }

    pub fn classify(
        &self,
        job_id: &str,
        document: &Value,
        checkpoint_info: Option<&Value>,
    ) -> Result<ClassifiedJob, ClassifyError> {
        if !document.is_object() {
            return Err(ClassifyError::MalformedDocument {
                job_id: job_id.to_string(),
            });
        }

        let extracted = self.extractor.extract(document);
        let document_name = document.get("name").and_then(Value::as_str).filter(|n| !n.is_empty());
        let resume_path = checkpoint_info.and_then(resolve_resume_path);

        if extracted.is_empty() {
            let name = document_name.unwrap_or(UNKNOWN_NAME).to_string();
            if !self.mapping.is_known_family(&name) {
                return Err(ClassifyError::NoUsableConfig {
                    job_id: job_id.to_string(),
                    name,
                });
            }
            info!("Job {} has no statements, falling back to ETL mapping for {}", job_id, name);
            return Ok(self.etl_job(job_id, name, resume_path));
        }

        let name = extracted
            .pipeline_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(document_name)
            .unwrap_or(UNKNOWN_NAME)
            .to_string();

        if self.mapping.is_known_family(&name) {
            info!("Job {} ({}) matches the ETL mapping", job_id, name);
            return Ok(self.etl_job(job_id, name, resume_path));
        }

        let program_args = encode_program_args(&extracted).map_err(|source| ClassifyError::Encoding {
            job_id: job_id.to_string(),
            source,
        })?;

        info!("Job {} ({}) classified as query job", job_id, name);
        Ok(ClassifiedJob {
            job_id: job_id.to_string(),
            job_name: name,
            result: ClassificationResult::Query(QueryJobDescriptor {
                entry_class: QUERY_ENTRY_CLASS.to_string(),
                parallelism: None,
                program_args,
                savepoint_path: resume_path,
            }),
        })
    }

    fn etl_job(&self, job_id: &str, name: String, savepoint: Option<String>) -> ClassifiedJob {
        let etl = match self.mapping.resolve_artifact(&name) {
            Some(info) => info.label(),
            None => {
                warn!("No artifact resolved for ETL job {} ({})", job_id, name);
                String::new()
            }
        };

        ClassifiedJob {
            job_id: job_id.to_string(),
            job_name: name,
            result: ClassificationResult::Etl(EtlJobDescriptor { etl, savepoint }),
        }
    }
}

impl Default for JobClassifier {
    fn default() -> Self {
        Self::new(ConfigExtractor::default(), EtlMapping::builtin())
    }
}

/// Compact JSON of the extracted config, base64 encoded
pub fn encode_program_args(config: &ExtractedConfig) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    Ok(STANDARD.encode(json))
}

/// Inverse of [`encode_program_args`], used when inspecting descriptors
pub fn decode_program_args(program_args: &str) -> Option<Value> {
    let bytes = STANDARD.decode(program_args).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::etl_mapping::MappingEntry;
    use serde_json::json;

    fn document(user_config: Value) -> Value {
        json!({"jid": "j", "name": "doc_name", "execution-config": {"user-config": user_config}})
    }

    #[test]
    fn test_query_job_with_statements() {
        let classifier = JobClassifier::default();
        let doc = document(json!({
            "marketing.ddl": "[\"CREATE TABLE t (id INT)\"]",
            "marketing.sql": ["INSERT INTO t SELECT 1"],
            "pipeline.name": "custom_pipeline"
        }));

        let job = classifier.classify("a1", &doc, None).unwrap();
        assert_eq!(job.key(), "a1-custom_pipeline");
        let ClassificationResult::Query(descriptor) = job.result else {
            panic!("expected query descriptor");
        };
        assert_eq!(descriptor.entry_class, QUERY_ENTRY_CLASS);
        assert_eq!(descriptor.savepoint_path, None);
        assert_eq!(
            decode_program_args(&descriptor.program_args).unwrap(),
            json!({
                "marketing.ddl": ["CREATE TABLE t (id INT)"],
                "marketing.sql": ["INSERT INTO t SELECT 1"],
                "pipeline.name": "custom_pipeline"
            })
        );
    }

    #[test]
    fn test_name_match_wins_over_statements() {
        let classifier = JobClassifier::default();
        let doc = document(json!({"marketing.sql": "[\"INSERT 1\"]", "pipeline.name": "salary_job"}));

        let job = classifier.classify("a2", &doc, None).unwrap();
        assert_eq!(job.result.family(), "etl");
    }

    #[test]
    fn test_working_name_falls_back_to_document_name() {
        let classifier = JobClassifier::default();
        let doc = document(json!({"marketing.sql": "[\"INSERT 1\"]"}));
        assert_eq!(classifier.classify("a3", &doc, None).unwrap().job_name, "doc_name");

        let nameless = json!({"execution-config": {"user-config": {"marketing.sql": ["x"]}}});
        assert_eq!(classifier.classify("a4", &nameless, None).unwrap().job_name, "unknown");
    }

    #[test]
    fn test_unmatched_job_without_statements_fails() {
        let classifier = JobClassifier::default();
        let doc = json!({"name": "unregistered_name_xyz", "execution-config": {"user-config": {}}});
        assert!(matches!(
            classifier.classify("a5", &doc, None),
            Err(ClassifyError::NoUsableConfig { .. })
        ));
    }

    #[test]
    fn test_non_object_document_is_malformed() {
        let classifier = JobClassifier::default();
        assert!(matches!(
            classifier.classify("a6", &json!([1, 2]), None),
            Err(ClassifyError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_injected_mapping() {
        let mapping = EtlMapping::new(vec![MappingEntry::new("nightly", "Nightly load", "nightly.jar")]);
        let classifier = JobClassifier::new(ConfigExtractor::default(), Arc::new(mapping));
        let doc = json!({"name": "nightly_7"});
        let checkpoint = json!({"latest": {"savepoint": {"external_path": "s3://sp"}}});

        let job = classifier.classify("a7", &doc, Some(&checkpoint)).unwrap();
        assert_eq!(
            job.result,
            ClassificationResult::Etl(EtlJobDescriptor {
                etl: "Nightly load nightly |nightly.jar".into(),
                savepoint: Some("s3://sp".into()),
            })
        );
    }
}
