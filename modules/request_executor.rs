//! Request execution against the control plane REST surface
//!
//! Every call goes through [`RequestExecutor::execute`], which drives a bounded
//! attempt loop over a [`Transport`]. A 401 ends the loop immediately; any other
//! failure is retried after a fixed pause until the attempt budget is spent.

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

// Constants
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("job-relauncher/", env!("CARGO_PKG_VERSION"));
const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP verbs used against the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// Status and undecoded body of a single exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP status level
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// The "send request, get status and body" capability
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError>;
}

/// Terminal outcome of a request after the attempt loop ends
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("authentication failed for {path} (401): {body}")]
    Authentication { path: String, body: String },

    #[error("request to {path} failed after {attempts} attempt(s), last status {}: {body}", display_status(.status))]
    Exhausted {
        path: String,
        attempts: u32,
        status: Option<u16>,
        body: String,
    },
}

fn display_status(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string())
}

impl RequestError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, RequestError::Authentication { .. })
    }
}

/// Attempt budget and the pause between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of one pass through the attempt loop
enum Attempt {
    Success(u16, Value),
    Retryable { status: Option<u16>, body: String },
    Terminal(RequestError),
}

/// Issues control plane calls with bounded retry
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Executes a request and returns the status with the parsed body.
    ///
    /// Bodies that are not JSON come back as `{"rawResponse": body}`; an empty
    /// body on a 2xx status comes back as `{"status": "success"}`.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), RequestError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let started = Instant::now();
        let mut last_status = None;
        let mut last_body = String::new();

        for attempt in 1..=max_attempts {
            debug!("{} {} (attempt {}/{})", method, path, attempt, max_attempts);

            match self.attempt(method, path, body).await {
                Attempt::Success(status, value) => {
                    info!(
                        "{} {} succeeded with status {} in {} ms",
                        method,
                        path,
                        status,
                        started.elapsed().as_millis()
                    );
                    return Ok((status, value));
                }
                Attempt::Terminal(err) => {
                    error!("{} {} failed permanently: {}", method, path, err);
                    return Err(err);
                }
                Attempt::Retryable { status, body } => {
                    last_status = status;
                    last_body = body;
                }
            }

            if attempt < max_attempts {
                warn!(
                    "Retrying {} {} in {:?} (attempt {} of {})",
                    method,
                    path,
                    self.policy.delay,
                    attempt + 1,
                    max_attempts
                );
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        error!("Max attempts ({}) reached for {} {}", max_attempts, method, path);
        Err(RequestError::Exhausted {
            path: path.to_string(),
            attempts: max_attempts,
            status: last_status,
            body: last_body,
        })
    }

    /// Convenience wrapper returning only the parsed body
    pub async fn get(&self, path: &str) -> Result<Value, RequestError> {
        self.execute(Method::Get, path, None).await.map(|(_, value)| value)
    }

    /// Convenience wrapper returning only the parsed body
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, RequestError> {
        self.execute(Method::Post, path, Some(body))
            .await
            .map(|(_, value)| value)
    }

    async fn attempt(&self, method: Method, path: &str, body: Option<&Value>) -> Attempt {
        let response = match self.transport.send(method, path, body).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} transport failure: {}", method, path, e);
                return Attempt::Retryable {
                    status: None,
                    body: e.to_string(),
                };
            }
        };

        if response.is_success() {
            return Attempt::Success(response.status, parse_body(response.status, &response.body));
        }

        warn!(
            "{} {} returned status {}: {}",
            method,
            path,
            response.status,
            preview(&response.body)
        );

        if response.status == 401 {
            return Attempt::Terminal(RequestError::Authentication {
                path: path.to_string(),
                body: response.body,
            });
        }

        Attempt::Retryable {
            status: Some(response.status),
            body: response.body,
        }
    }
}

/// Decodes a response body, wrapping non-JSON text instead of failing
pub fn parse_body(status: u16, body: &str) -> Value {
    if body.trim().is_empty() {
        let outcome = if (200..300).contains(&status) {
            "success"
        } else {
            "failure"
        };
        return json!({ "status": outcome });
    }

    serde_json::from_str(body).unwrap_or_else(|_| json!({ "rawResponse": body }))
}

fn preview(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_CHARS {
        format!("{}...", body.chars().take(BODY_PREVIEW_CHARS).collect::<String>())
    } else {
        body.to_string()
    }
}

/// Basic-Auth HTTP transport backed by reqwest
///
/// Idle pooling is disabled so each attempt opens its own connection and the
/// connection is released as soon as the response has been read.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    authorization: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let credentials = format!("{}:{}", username, password);
        let authorization = format!("Basic {}", general_purpose::STANDARD.encode(credentials.as_bytes()));

        info!("Initialized HTTP transport for {}", base_url);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            authorization,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .header(AUTHORIZATION, &self.authorization)
        .header(ACCEPT, "*/*");

        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        Ok(RawResponse::new(status, text))
    }
}
