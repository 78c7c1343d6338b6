// src/fetch/transport.rs
//! HTTP seam. Strategies talk to an [`HttpTransport`] so the fetch chain can
//! run against reqwest in production and against in-memory fixtures in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;

/// Response body as the strategies see it.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Text(String),
    Json(serde_json::Value),
}

impl HttpBody {
    /// Body as a string; JSON is serialized.
    pub fn into_string(self) -> String {
        match self {
            HttpBody::Text(s) => s,
            HttpBody::Json(v) => match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            },
        }
    }
}

pub type Headers = [(String, String)];

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpBody, FetchError>;
    fn name(&self) -> &'static str;
}

pub const DEFAULT_USER_AGENT: &str = concat!("wiki-context/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// reqwest-backed transport.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpBody, FetchError> {
        let mut req = self.http.get(url);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req.send().await?.error_for_status()?;

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));

        let text = resp.text().await?;
        if is_json {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text) {
                return Ok(HttpBody::Json(v));
            }
        }
        Ok(HttpBody::Text(text))
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

/// In-memory transport: URL → body, with a call counter and captured headers.
/// Unknown URLs answer 404; a "down" transport fails every request.
#[derive(Debug, Default)]
pub struct FixtureTransport {
    bodies: Mutex<HashMap<String, HttpBody>>,
    down: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: &str, body: &str) -> Self {
        self.set(url, HttpBody::Text(body.to_string()));
        self
    }

    pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
        self.set(url, HttpBody::Json(body));
        self
    }

    pub fn set(&self, url: &str, body: HttpBody) {
        let mut g = self.bodies.lock().unwrap_or_else(|p| p.into_inner());
        g.insert(url.to_string(), body);
    }

    /// Make every subsequent request fail (or succeed again).
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(url, headers)` of every request seen so far.
    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl HttpTransport for FixtureTransport {
    async fn get(&self, url: &str, headers: &Headers) -> Result<HttpBody, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((url.to_string(), headers.to_vec()));

        if self.down.load(Ordering::SeqCst) {
            return Err(FetchError::Transport(format!("{url}: connection refused")));
        }
        let g = self.bodies.lock().unwrap_or_else(|p| p.into_inner());
        g.get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
