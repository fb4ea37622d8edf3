use crate::error::{PerformanceError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        })
    }
}

/// Sends one authenticated JSON request and returns the decoded body.
///
/// Implementations classify failures into the crate's error taxonomy:
/// 401/403 as [`PerformanceError::Authorization`], 400/422 as
/// [`PerformanceError::Validation`], anything else as a transport failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<Value>,
    ) -> Result<Value>;

    async fn get(&self, url: &str, token: &str) -> Result<Value> {
        self.request(HttpMethod::Get, url, token, None).await
    }
}

/// Maps a non-success status and its body to an error.
pub fn classify_status(status: u16, body: &str) -> PerformanceError {
    let message = server_message(body);

    match status {
        401 | 403 => PerformanceError::Authorization { status, message },
        400 | 422 => PerformanceError::Validation(
            message.unwrap_or_else(|| format!("Request rejected (status {})", status)),
        ),
        _ => PerformanceError::Transport(match message {
            Some(m) => format!("status {}: {}", status, m),
            None => format!("status {}", status),
        }),
    }
}

/// The `message` (or `error`) field of an error payload, if any.
pub fn server_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| parsed.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(feature = "http")]
pub use reqwest_transport::HttpTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::*;
    use reqwest::Client;
    use std::time::Duration;

    #[derive(Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new(timeout_secs: u64) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()?;
            Ok(Self { client })
        }

        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn request(
            &self,
            method: HttpMethod,
            url: &str,
            token: &str,
            body: Option<Value>,
        ) -> Result<Value> {
            let builder = match method {
                HttpMethod::Get => self.client.get(url),
                HttpMethod::Post => self.client.post(url),
                HttpMethod::Put => self.client.put(url),
                HttpMethod::Delete => self.client.delete(url),
            };

            let builder = builder.bearer_auth(token);
            let builder = match body {
                Some(payload) => builder.json(&payload),
                None => builder,
            };

            let res = builder.send().await?;
            let status = res.status();
            let text = res.text().await?;

            if !status.is_success() {
                return Err(classify_status(status.as_u16(), &text));
            }

            if text.trim().is_empty() {
                return Ok(Value::Null);
            }

            serde_json::from_str(&text).map_err(|e| {
                PerformanceError::ShapeMismatch(format!("{} {} returned non-JSON body: {}", method, url, e))
            })
        }
    }
}
