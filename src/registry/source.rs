// ABOUTME: Where releases come from: the GitHub releases API or a file:// feed on disk.
// ABOUTME: Also fetches release assets (checksum manifests, binaries) for self-update.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::{RawRelease, RegistryError, Release};

pub const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/keel-deploy/keel/releases";

/// Overrides the release feed, e.g. `file:///srv/mirror/releases.json`.
pub const FEED_URL_ENV: &str = "KEEL_RELEASE_FEED_URL";

/// Bearer token for the GitHub API, to lift anonymous rate limits.
pub const TOKEN_ENV: &str = "KEEL_GITHUB_TOKEN";

const FEED_TIMEOUT: Duration = Duration::from_secs(5);
const MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Every release in feed order (newest first for GitHub).
    async fn releases(&self) -> Result<Vec<Release>, RegistryError>;

    /// Fetch a small text asset such as `checksums.txt`.
    async fn fetch_text(&self, url: &str) -> Result<String, RegistryError>;

    /// Stream an asset into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &mut tokio::fs::File) -> Result<u64, RegistryError>;
}

/// Release feed over HTTPS, or from disk for `file://` URLs.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    feed_url: String,
    token: Option<String>,
}

fn file_path(url: &str) -> Option<PathBuf> {
    url.strip_prefix("file://").map(PathBuf::from)
}

impl FeedClient {
    pub fn new(feed_url: impl Into<String>, token: Option<String>) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RegistryError::Client)?;
        Ok(Self {
            client,
            feed_url: feed_url.into(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Feed URL and token from `KEEL_RELEASE_FEED_URL` and `KEEL_GITHUB_TOKEN`.
    pub fn from_env() -> Result<Self, RegistryError> {
        let feed_url = std::env::var(FEED_URL_ENV)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        Self::new(feed_url, std::env::var(TOKEN_ENV).ok())
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, RegistryError> {
        tracing::debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| RegistryError::Http {
                url: url.to_string(),
                source,
            })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn feed_body(&self) -> Result<String, RegistryError> {
        if let Some(path) = file_path(&self.feed_url) {
            return tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| RegistryError::File { path, source });
        }

        let mut request = self
            .client
            .get(&self.feed_url)
            .timeout(FEED_TIMEOUT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let http_err = |source| RegistryError::Http {
            url: self.feed_url.clone(),
            source,
        };
        let response = request.send().await.map_err(http_err)?;
        if !response.status().is_success() {
            return Err(RegistryError::Status {
                url: self.feed_url.clone(),
                status: response.status().as_u16(),
            });
        }
        response.text().await.map_err(http_err)
    }
}

#[async_trait]
impl ReleaseSource for FeedClient {
    async fn releases(&self) -> Result<Vec<Release>, RegistryError> {
        let body = self.feed_body().await?;
        let raw: Vec<RawRelease> =
            serde_json::from_str(&body).map_err(|source| RegistryError::Decode {
                url: self.feed_url.clone(),
                source,
            })?;
        Ok(raw.into_iter().filter_map(Release::from_raw).collect())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, RegistryError> {
        if let Some(path) = file_path(url) {
            return tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| RegistryError::File { path, source });
        }
        self.get(url, MANIFEST_TIMEOUT)
            .await?
            .text()
            .await
            .map_err(|source| RegistryError::Http {
                url: url.to_string(),
                source,
            })
    }

    async fn download(&self, url: &str, dest: &mut tokio::fs::File) -> Result<u64, RegistryError> {
        let write_err = |source| RegistryError::Write {
            url: url.to_string(),
            source,
        };

        if let Some(path) = file_path(url) {
            let mut src = tokio::fs::File::open(&path)
                .await
                .map_err(|source| RegistryError::File { path, source })?;
            let written = tokio::io::copy(&mut src, dest).await.map_err(write_err)?;
            dest.flush().await.map_err(write_err)?;
            return Ok(written);
        }

        let response = self.get(url, DOWNLOAD_TIMEOUT).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| RegistryError::Http {
                url: url.to_string(),
                source,
            })?;
            dest.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        dest.flush().await.map_err(write_err)?;
        Ok(written)
    }
}
