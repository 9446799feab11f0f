//! Blocking JSON-over-HTTP transport shared by the country and weather providers.
//!
//! Every outbound call in the crate goes through [`JsonTransport::get_json`], so a
//! provider never touches `reqwest` directly. [`HttpTransport`] is the real
//! implementation; [`MapTransport`] answers from canned payloads and is what the
//! offline tests drive the pipeline with.
//!
//! No retries: a failed call is reported once and the caller degrades.

use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Mutex;
use std::time::Duration;

pub trait JsonTransport: Debug + Send + Sync {
    /// GET `url` and decode the body as JSON. Non-2xx statuses are errors.
    fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(config.country_timeout.min(Duration::from_secs(10)))
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("cannot build http client: {e}")))?;
        Ok(Self { http })
    }
}

impl JsonTransport for HttpTransport {
    fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A canned answer registered on a [`MapTransport`].
#[derive(Debug, Clone)]
pub enum Canned {
    Json(Value),
    Status(u16),
    /// A 2xx response whose body is not valid JSON.
    Malformed,
}

/// In-memory transport: answers each URL from the longest registered prefix.
///
/// Unknown URLs fail with [`FetchError::NoRoute`], which callers treat like any
/// other network failure. Every requested URL is recorded in order.
#[derive(Debug, Default)]
pub struct MapTransport {
    routes: Vec<(String, Canned)>,
    calls: Mutex<Vec<String>>,
}

impl MapTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: impl Into<String>, body: Value) -> Self {
        self.routes.push((prefix.into(), Canned::Json(body)));
        self
    }

    pub fn status(mut self, prefix: impl Into<String>, status: u16) -> Self {
        self.routes.push((prefix.into(), Canned::Status(status)));
        self
    }

    pub fn malformed(mut self, prefix: impl Into<String>) -> Self {
        self.routes.push((prefix.into(), Canned::Malformed));
        self
    }

    /// URLs requested so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl JsonTransport for MapTransport {
    fn get_json(&self, url: &str, _timeout: Duration) -> Result<Value, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        let hit = self
            .routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());

        match hit {
            Some((_, Canned::Json(v))) => Ok(v.clone()),
            Some((_, Canned::Status(status))) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some((_, Canned::Malformed)) => Err(FetchError::Decode {
                url: url.to_string(),
                reason: "expected value at line 1 column 1".into(),
            }),
            None => Err(FetchError::NoRoute(url.to_string())),
        }
    }
}

// Allow -, _, . unescaped in path and query segments
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Percent-encode a single (trimmed) path or query segment.
pub fn enc(part: &str) -> String {
    percent_encoding::utf8_percent_encode(part.trim(), SAFE).to_string()
}
