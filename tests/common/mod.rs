#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sales_performance::transport::classify_status;
use sales_performance::{ApiConfig, HttpMethod, PerformanceError, Result, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://api.test";

pub enum Reply {
    Json(Value),
    Status(u16, Value),
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: HttpMethod,
    pub url: String,
    pub token: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    replies: HashMap<(String, String), Reply>,
    calls: Vec<Call>,
}

/// Canned responses keyed by method and URL; unknown URLs answer 404.
/// Clones share the same replies and call log.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: HttpMethod, path: &str, reply: Reply) -> Self {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert((method.to_string(), url(path)), reply);
        self
    }

    pub fn on_get(self, path: &str, body: Value) -> Self {
        self.on(HttpMethod::Get, path, Reply::Json(body))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    pub fn call_count(&self, path: &str) -> usize {
        let target = url(path);
        self.calls().iter().filter(|c| c.url == target).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            method,
            url: url.to_string(),
            token: token.to_string(),
            body,
        });

        match state.replies.get(&(method.to_string(), url.to_string())) {
            Some(Reply::Json(value)) => Ok(value.clone()),
            Some(Reply::Status(status, body)) => Err(classify_status(*status, &body.to_string())),
            Some(Reply::Unreachable) => Err(PerformanceError::Transport(
                "connection refused".to_string(),
            )),
            None => Err(classify_status(404, "")),
        }
    }
}

pub fn url(path: &str) -> String {
    format!("{}{}", BASE_URL, path)
}

pub fn config() -> ApiConfig {
    ApiConfig::new(BASE_URL)
}

pub fn token_for(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}
