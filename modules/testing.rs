//! In-memory transport used by unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::request_executor::{Method, RawResponse, Transport, TransportError};

/// A request as the fake transport saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Scripted responses keyed by path.
///
/// Each path replays its queue in order and then keeps answering with the last
/// scripted response. Unscripted paths answer 404.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<RawResponse, TransportError>>>>,
    last: Mutex<HashMap<String, RawResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: &str, status: u16, body: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(RawResponse::new(status, body)));
    }

    pub fn push_json(&self, path: &str, body: &Value) {
        self.push(path, 200, &body.to_string());
    }

    pub fn push_error(&self, path: &str, error: TransportError) {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(Ok(response)) => {
                self.last
                    .lock()
                    .unwrap()
                    .insert(path.to_string(), response.clone());
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self
                .last
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_else(|| RawResponse::new(404, "not found"))),
        }
    }
}
