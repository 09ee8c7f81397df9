// ABOUTME: In-memory release source for registry and self-update tests.
// ABOUTME: Assets are served from a map of URL to bytes; unknown URLs answer HTTP 404.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel::registry::{Asset, RegistryError, Release, ReleaseSource};
use keel::types::Channel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[derive(Clone, Default)]
pub struct MemorySource {
    releases: Vec<Release>,
    assets: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    downloads: Arc<Mutex<Vec<String>>>,
}

pub fn release(tag: &str, channel: Channel, published_at: Option<&str>) -> Release {
    Release {
        name: tag.to_string(),
        tag: tag.to_string(),
        channel,
        published_at: published_at.map(|s| {
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc)
        }),
        prerelease: channel != Channel::Release,
        changelog: format!("Changes in {tag}"),
        url: format!("https://example.invalid/releases/{tag}"),
        assets: Vec::new(),
    }
}

impl MemorySource {
    pub fn new(releases: Vec<Release>) -> Self {
        Self {
            releases,
            ..Default::default()
        }
    }

    /// Attach an asset to the release tagged `tag` and serve `bytes` for it.
    pub fn with_asset(mut self, tag: &str, name: &str, bytes: &[u8]) -> Self {
        let url = format!("mem://{tag}/{name}");
        let release = self
            .releases
            .iter_mut()
            .find(|r| r.tag == tag)
            .expect("release must exist before adding assets");
        release.assets.push(Asset {
            name: name.to_string(),
            download_url: url.clone(),
        });
        self.assets.lock().insert(url, bytes.to_vec());
        self
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }

    fn asset(&self, url: &str) -> Result<Vec<u8>, RegistryError> {
        self.assets
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[async_trait]
impl ReleaseSource for MemorySource {
    async fn releases(&self) -> Result<Vec<Release>, RegistryError> {
        Ok(self.releases.clone())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, RegistryError> {
        Ok(String::from_utf8_lossy(&self.asset(url)?).into_owned())
    }

    async fn download(&self, url: &str, dest: &mut tokio::fs::File) -> Result<u64, RegistryError> {
        self.downloads.lock().push(url.to_string());
        let bytes = self.asset(url)?;
        let write_err = |source| RegistryError::Write {
            url: url.to_string(),
            source,
        };
        dest.write_all(&bytes).await.map_err(write_err)?;
        dest.flush().await.map_err(write_err)?;
        Ok(bytes.len() as u64)
    }
}
