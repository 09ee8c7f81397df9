// ABOUTME: Release registry client: reads the release feed and sorts releases into channels.
// ABOUTME: Application releases feed `keel update`; installer-v* releases feed self-update.

mod classify;
mod client;
mod source;

pub use classify::classify;
pub use client::RegistryClient;
pub use source::{DEFAULT_FEED_URL, FEED_URL_ENV, FeedClient, ReleaseSource, TOKEN_ENV};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::types::Channel;

/// Tag prefix of keel's own releases, published to the same feed as the application.
pub const SELF_TAG_PREFIX: &str = "installer-v";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an unreadable release feed: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write download from {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Feed entry as published, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRelease {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<RawAsset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Display name; the tag when the feed gives none.
    pub name: String,
    pub tag: String,
    pub channel: Channel,
    pub published_at: Option<DateTime<Utc>>,
    pub prerelease: bool,
    pub changelog: String,
    pub url: String,
    pub assets: Vec<Asset>,
}

impl Release {
    /// Validate a feed entry. Entries without a tag are dropped.
    pub fn from_raw(raw: RawRelease) -> Option<Self> {
        let tag = raw.tag_name.filter(|t| !t.trim().is_empty())?;
        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| tag.clone());
        let channel = classify(&tag, &name, raw.prerelease);
        let published_at = raw
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Some(Self {
            name,
            tag,
            channel,
            published_at,
            prerelease: raw.prerelease,
            changelog: raw.body.unwrap_or_default(),
            url: raw.html_url.unwrap_or_default(),
            assets: raw
                .assets
                .into_iter()
                .map(|a| Asset {
                    name: a.name,
                    download_url: a.browser_download_url,
                })
                .collect(),
        })
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// True for keel's own releases.
    pub fn is_self_release(&self) -> bool {
        self.tag.starts_with(SELF_TAG_PREFIX)
    }
}
