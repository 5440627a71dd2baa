use super::*;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::modules::control_plane::ControlPlaneClient;
    use crate::modules::request_executor::{Method, RawResponse, RetryPolicy, Transport, TransportError};
    use crate::modules::testing::FakeTransport;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn processor(transport: Arc<FakeTransport>) -> JobProcessor {
        let client = ControlPlaneClient::new(
            transport,
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
            "http://flink.test",
        );
        JobProcessor::new(client, JobClassifier::default()).with_workers(Some(2))
    }

    fn script_job(transport: &FakeTransport, job_id: &str, config: Value, checkpoints: Value) {
        transport.push_json(&format!("/jobs/{}/config", job_id), &config);
        transport.push_json(&format!("/jobs/{}/checkpoints", job_id), &checkpoints);
    }

    fn daily_task_config() -> Value {
        json!({
            "jid": "q1",
            "name": "insert-into_default_catalog",
            "execution-config": {
                "user-config": {
                    "marketing.ddl": "[\"CREATE TABLE t (id INT)\"]",
                    "marketing.sql": "[\"INSERT INTO t SELECT 1\"]",
                    "pipeline.name": "daily_task_task"
                }
            }
        })
    }

    fn savepoint(path: &str) -> Value {
        json!({"latest": {"savepoint": {"external_path": path}}})
    }

    #[tokio::test]
    async fn test_daily_task_becomes_query_descriptor() {
        let transport = Arc::new(FakeTransport::new());
        script_job(&transport, "q1", daily_task_config(), savepoint("s3://bucket/sp-1"));

        let outcome = processor(transport).process_job("q1").await;
        let JobOutcome::Classified(job) = outcome else {
            panic!("expected a classified job");
        };

        assert_eq!(job.key(), "q1-daily_task_task");
        let ClassificationResult::Query(descriptor) = job.result else {
            panic!("expected a query descriptor");
        };
        assert_eq!(descriptor.entry_class, QUERY_ENTRY_CLASS);
        assert_eq!(descriptor.parallelism, None);
        assert_eq!(descriptor.savepoint_path.as_deref(), Some("s3://bucket/sp-1"));

        let args = decode_program_args(&descriptor.program_args).unwrap();
        assert_eq!(args["table.exec.state.ttl"], "2");
        assert_eq!(args["marketing.ddl"], json!(["CREATE TABLE t (id INT)"]));
        assert_eq!(args["marketing.sql"], json!(["INSERT INTO t SELECT 1"]));
        assert_eq!(args["pipeline.name"], "daily_task_task");
    }

    #[tokio::test]
    async fn test_salary_job_variant_becomes_etl_descriptor() {
        let transport = Arc::new(FakeTransport::new());
        script_job(
            &transport,
            "e1",
            json!({"jid": "e1", "name": "salary_job_2", "execution-config": {"user-config": {}}}),
            json!({"latest": {"savepoint": null}}),
        );

        let JobOutcome::Classified(job) = processor(transport).process_job("e1").await else {
            panic!("expected a classified job");
        };

        assert_eq!(job.key(), "e1-salary_job_2");
        assert_eq!(
            job.result,
            ClassificationResult::Etl(EtlJobDescriptor {
                etl: "Payroll salary_job |salary-flink-SalaryJob-1.0.0.jar".into(),
                savepoint: None,
            })
        );
    }

    #[test]
    fn test_program_args_round_trip() {
        let classifier = JobClassifier::default();
        let cases = [
            json!({"marketing.ddl": ["CREATE TABLE a"], "pipeline.name": "custom_one"}),
            json!({"marketing.sql": "[\"INSERT INTO b\", \"INSERT INTO c\"]"}),
            json!({"marketing.sql": "[not json", "pipeline.name": "custom_two"}),
            json!({"marketing.ddl": "CREATE TABLE raw", "marketing.sql": ["x"], "pipeline.name": "weekly_gold_task"}),
        ];

        for user_config in cases {
            let doc = json!({"name": "plain", "execution-config": {"user-config": user_config}});
            let extracted = crate::modules::config_extractor::ConfigExtractor::default().extract(&doc);
            let job = classifier.classify("r1", &doc, None).unwrap();
            let ClassificationResult::Query(descriptor) = job.result else {
                panic!("expected a query descriptor for {}", doc);
            };
            assert_eq!(
                decode_program_args(&descriptor.program_args).unwrap(),
                serde_json::to_value(&extracted).unwrap()
            );
        }
    }

    #[test]
    fn test_classification_is_idempotent() {
        let classifier = JobClassifier::default();
        let doc = daily_task_config();
        let checkpoint = savepoint("s3://bucket/sp-1");

        let render = |job: ClassifiedJob| match job.result {
            ClassificationResult::Query(d) => serde_json::to_vec(&d).unwrap(),
            ClassificationResult::Etl(d) => serde_json::to_vec(&d).unwrap(),
        };
        let first = render(classifier.classify("q1", &doc, Some(&checkpoint)).unwrap());
        let second = render(classifier.classify("q1", &doc, Some(&checkpoint)).unwrap());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_batch_contains_failures_per_job() {
        let transport = Arc::new(FakeTransport::new());
        script_job(&transport, "q1", daily_task_config(), savepoint("s3://bucket/sp-1"));
        script_job(
            &transport,
            "e1",
            json!({"name": "salary_job_2"}),
            json!({}),
        );
        // Unmatched name and no statements
        script_job(
            &transport,
            "x1",
            json!({"name": "unregistered_name_xyz", "execution-config": {"user-config": {}}}),
            json!({}),
        );
        // Config endpoint keeps failing
        transport.push("/jobs/f1/config", 500, "internal error");
        // Checkpoint endpoint fails, job still succeeds without savepoint
        transport.push_json("/jobs/c1/config", &daily_task_config());
        transport.push("/jobs/c1/checkpoints", 503, "unavailable");

        let ids: Vec<String> = ["q1", "e1", "x1", "f1", "c1"].iter().map(|s| s.to_string()).collect();
        let results = processor(transport.clone()).process_all(&ids).await;

        assert_eq!(results.total, 5);
        assert_eq!(results.succeeded, 3);
        assert_eq!(results.failed, 2);
        assert_eq!(results.query.len(), 2);
        assert_eq!(results.etl.len(), 1);
        assert!(results.etl.contains_key("e1-salary_job_2"));
        assert_eq!(results.query["c1-daily_task_task"].savepoint_path, None);
        assert_eq!(
            results.query["q1-daily_task_task"].savepoint_path.as_deref(),
            Some("s3://bucket/sp-1")
        );

        let mut failed: Vec<&str> = results.failed_jobs.iter().map(|(id, _)| id.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["f1", "x1"]);

        assert_eq!(transport.call_count("/jobs/f1/config"), 3);
        assert_eq!(transport.call_count("/jobs/f1/checkpoints"), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let transport = Arc::new(FakeTransport::new());
        let results = processor(transport.clone()).process_all(&[]).await;
        assert_eq!(results.total, 0);
        assert!(!results.is_complete_success());
        assert!(transport.requests().is_empty());
    }

    /// Answers every config with an ETL job after a short delay and tracks how
    /// many requests were outstanding at once
    #[derive(Default)]
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(
            &self,
            _method: Method,
            path: &str,
            _body: Option<&Value>,
        ) -> Result<RawResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let body = if path.ends_with("/config") {
                json!({"name": "salary_job_2"})
            } else {
                json!({})
            };
            Ok(RawResponse::new(200, body.to_string()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_bounded_by_workers() {
        let transport = Arc::new(SlowTransport::default());
        let client = ControlPlaneClient::new(
            transport.clone(),
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::ZERO,
            },
            "http://flink.test",
        );
        let processor = JobProcessor::new(client, JobClassifier::default()).with_workers(Some(2));

        let ids: Vec<String> = (0..10).map(|i| format!("e{}", i)).collect();
        let results = processor.process_all(&ids).await;

        assert_eq!(results.succeeded, 10);
        assert_eq!(results.etl.len(), 10);
        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= 2, "peak of {} concurrent requests", peak);
        assert_eq!(transport.in_flight.load(Ordering::SeqCst), 0);
    }
}
