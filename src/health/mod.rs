// ABOUTME: HTTP health prober for the deployed application's /health endpoint.
// ABOUTME: Healthy means the process answered "ok" and both database and cache are reachable.

mod gate;

pub use gate::{GateTimeout, wait_for_healthy};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Path appended to the base URL for every probe.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("health request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("health endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("health endpoint {url} returned an unreadable body: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// One parsed response of the health endpoint. Missing fields read as false or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub db: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub profile: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok" && self.db && self.cache
    }

    /// Short reason for an unhealthy snapshot, used in gate timeouts.
    pub fn describe(&self) -> String {
        let mut failing = Vec::new();
        if self.status != "ok" {
            failing.push(format!("status '{}'", self.status));
        }
        if !self.db {
            failing.push("database unreachable".to_string());
        }
        if !self.cache {
            failing.push("cache unreachable".to_string());
        }
        if failing.is_empty() {
            "healthy".to_string()
        } else {
            failing.join(", ")
        }
    }
}

/// Accepts the timestamp as either a string or a number.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}

/// Base URL of a deployment: plain HTTP for `localhost`, HTTPS otherwise.
pub fn base_url(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    if domain.is_empty() || domain == "localhost" {
        "http://localhost".to_string()
    } else {
        format!("https://{}", domain)
    }
}

/// A single health probe. Implementations do not retry.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, base_url: &str) -> Result<HealthSnapshot, HealthError>;
}

/// Probes over HTTP with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, HealthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HealthError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProber {
    async fn probe(&self, base_url: &str) -> Result<HealthSnapshot, HealthError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH);
        tracing::debug!(url = %url, "probing health");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| HealthError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HealthError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<HealthSnapshot>()
            .await
            .map_err(|source| HealthError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_requires_all_three() {
        let mut snapshot = HealthSnapshot {
            status: "ok".to_string(),
            db: true,
            cache: true,
            ..Default::default()
        };
        assert!(snapshot.is_healthy());

        snapshot.cache = false;
        assert!(!snapshot.is_healthy());
        assert_eq!(snapshot.describe(), "cache unreachable");

        snapshot.cache = true;
        snapshot.status = "degraded".to_string();
        assert!(!snapshot.is_healthy());
    }

    #[test]
    fn missing_fields_default() {
        let snapshot: HealthSnapshot = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(snapshot.status, "ok");
        assert!(!snapshot.db);
        assert!(!snapshot.cache);
        assert!(!snapshot.is_healthy());
    }

    #[test]
    fn numeric_timestamp_is_accepted() {
        let snapshot: HealthSnapshot = serde_json::from_str(
            r#"{"status":"ok","version":"1.2.0","db":true,"cache":true,"profile":"prod","timestamp":1700000000}"#,
        )
        .unwrap();
        assert_eq!(snapshot.timestamp, "1700000000");
        assert!(snapshot.is_healthy());
    }

    #[test]
    fn base_url_uses_http_only_for_localhost() {
        assert_eq!(base_url("localhost"), "http://localhost");
        assert_eq!(base_url(""), "http://localhost");
        assert_eq!(base_url("app.example.org"), "https://app.example.org");
    }
}
