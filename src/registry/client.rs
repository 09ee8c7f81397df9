// ABOUTME: Application release queries over a release source.
// ABOUTME: Hides keel's own releases and orders the rest newest first.

use std::cmp::Ordering;

use super::{RegistryError, Release, ReleaseSource};
use crate::types::Channel;

pub struct RegistryClient<S> {
    source: S,
}

impl<S: ReleaseSource> RegistryClient<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Application releases, newest publication first; undated entries last.
    pub async fn releases(&self) -> Result<Vec<Release>, RegistryError> {
        let mut releases: Vec<Release> = self
            .source
            .releases()
            .await?
            .into_iter()
            .filter(|r| !r.is_self_release())
            .collect();

        releases.sort_by(|a, b| match (&a.published_at, &b.published_at) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(releases)
    }

    pub async fn by_channel(&self, channel: Channel) -> Result<Vec<Release>, RegistryError> {
        Ok(self
            .releases()
            .await?
            .into_iter()
            .filter(|r| r.channel == channel)
            .collect())
    }

    /// Newest release on `channel`, if any.
    pub async fn latest(&self, channel: Channel) -> Result<Option<Release>, RegistryError> {
        Ok(self.by_channel(channel).await?.into_iter().next())
    }

    /// Release with exactly this tag.
    pub async fn find(&self, tag: &str) -> Result<Option<Release>, RegistryError> {
        Ok(self.releases().await?.into_iter().find(|r| r.tag == tag))
    }
}
