//! Blocking JSON-over-HTTP connector
//!
//! ## Overview
//!
//! Outbound notifications go through a small `ureq` client. Calls block the
//! current thread; the daemon runs them on tokio's blocking pool.
//!
//! ## Retries
//!
//! | Outcome | Retried |
//! |---------|---------|
//! | transport failure (DNS, refused, timeout) | yes |
//! | `429`, `5xx` | yes |
//! | other `4xx` | no |
//!
//! Attempt `n` waits `100ms * 2^n` first.
//!
//! ## Example Usage
//!
//! ```no_run
//! use fruiture_connectors::http::{HttpConfig, HttpConnector};
//!
//! # fn example() -> Result<(), fruiture_connectors::http::HttpError> {
//! let http = HttpConnector::new(HttpConfig::new("https://api.example.com").timeout_secs(10))?;
//! http.post("/v1/alerts", &serde_json::json!({"day": 4}))?;
//! # Ok(())
//! # }
//! ```

use crate::{ConnectionStats, Connector};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    /// No response: connection, DNS or timeout failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request body or response body was not valid JSON
    #[error("JSON error: {0}")]
    Json(String),

    #[error("Invalid HTTP configuration: {0}")]
    Config(String),
}

impl HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            HttpError::Transport(_) => true,
            HttpError::Status { status, .. } => *status == 429 || *status >= 500,
            HttpError::Json(_) | HttpError::Config(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Scheme and host, optionally a path prefix
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub user_agent: String,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            headers: BTreeMap::new(),
            max_retries: 3,
            user_agent: format!("fruiture/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Cloneable client; clones share the agent and the statistics
#[derive(Clone)]
pub struct HttpConnector {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl HttpConnector {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        let scheme_ok = ["http://", "https://"].iter().any(|s| config.base_url.starts_with(s));
        if !scheme_ok {
            return Err(HttpError::Config(format!("{:?} is not an http(s) URL", config.base_url)));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        Ok(Self {
            config,
            agent,
            stats: Arc::default(),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn get(&self, path: &str) -> Result<Value, HttpError> {
        self.execute("GET", path, None)
    }

    /// POST `body` as JSON; the reply is parsed as JSON, empty reads as null
    pub fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value, HttpError> {
        let body = serde_json::to_string(body).map_err(|e| HttpError::Json(e.to_string()))?;
        self.execute("POST", path, Some(body))
    }

    pub fn stats(&self) -> ConnectionStats {
        self.lock_stats().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self
            .agent
            .request(method, &self.url(path))
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        self.config
            .headers
            .iter()
            .fold(request, |request, (name, value)| request.set(name, value))
    }

    fn execute(&self, method: &str, path: &str, body: Option<String>) -> Result<Value, HttpError> {
        let mut attempt = 0;
        loop {
            match self.attempt(method, path, body.as_deref()) {
                Ok(value) => {
                    self.lock_stats().record_sent(body.as_ref().map_or(0, String::len));
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    std::thread::sleep(Duration::from_millis(100 << attempt.min(6)));
                }
                Err(e) => {
                    self.lock_stats().record_failure(&e);
                    return Err(e);
                }
            }
        }
    }

    fn attempt(&self, method: &str, path: &str, body: Option<&str>) -> Result<Value, HttpError> {
        let request = self.request(method, path);
        let response = match body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };
        let text = match response {
            Ok(response) => response.into_string().map_err(|e| HttpError::Transport(e.to_string()))?,
            Err(ureq::Error::Status(status, response)) => {
                return Err(HttpError::Status {
                    status,
                    body: response.into_string().unwrap_or_default(),
                })
            }
            Err(ureq::Error::Transport(e)) => return Err(HttpError::Transport(e.to_string())),
        };
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| HttpError::Json(e.to_string()))
    }

    fn lock_stats(&self) -> MutexGuard<'_, ConnectionStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for HttpConnector {
    type Error = HttpError;

    /// POST `data`, which must be JSON, to the path `topic`
    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        let value: Value = serde_json::from_slice(data).map_err(|e| HttpError::Json(e.to_string()))?;
        self.post(topic, &value).map(drop)
    }

    fn is_connected(&self) -> bool {
        // one request per call, nothing held open
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = HttpConfig::new("https://api.telegram.org")
            .timeout_secs(15)
            .max_retries(1)
            .header("X-Device", "shelf-1");

        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.headers.get("X-Device").map(String::as_str), Some("shelf-1"));
        assert!(config.user_agent.starts_with("fruiture/"));
    }

    #[test]
    fn test_scheme_is_required() {
        assert!(matches!(
            HttpConnector::new(HttpConfig::new("api.telegram.org")),
            Err(HttpError::Config(_))
        ));
        assert!(HttpConnector::new(HttpConfig::new("http://127.0.0.1:8080")).is_ok());
    }

    #[test]
    fn test_paths_join_without_double_slash() {
        let http = HttpConnector::new(HttpConfig::new("https://api.telegram.org/")).unwrap();
        assert_eq!(http.url("/bot1/sendMessage"), "https://api.telegram.org/bot1/sendMessage");
    }

    #[test]
    fn test_retry_classification() {
        assert!(HttpError::Transport("refused".into()).is_retryable());
        assert!(HttpError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(HttpError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!HttpError::Status { status: 403, body: String::new() }.is_retryable());
        assert!(!HttpError::Json("eof".into()).is_retryable());
    }

    #[test]
    fn test_send_rejects_non_json() {
        let mut http = HttpConnector::new(HttpConfig::new("http://127.0.0.1:9")).unwrap();
        assert!(matches!(http.send("/x", b"not json"), Err(HttpError::Json(_))));
        assert_eq!(http.stats().messages_failed, 0);
    }
}
