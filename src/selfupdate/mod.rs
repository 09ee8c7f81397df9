// ABOUTME: Self-update engine: finds keel's newest installer release, verifies it and swaps binaries.
// ABOUTME: Also provides the background "new version available" notice shown after commands.

mod checksum;
mod error;
mod swap;

pub use checksum::{MANIFEST_ASSET, expected_digest, sha256_file, verify};
pub use error::{SelfUpdateError, SelfUpdateErrorKind};
pub use swap::{old_path, staged_path, swap_executable};

use serde::Serialize;
use snafu::{ResultExt, ensure};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::registry::{Asset, FeedClient, ReleaseSource, SELF_TAG_PREFIX};
use error::{CurrentExeSnafu, DownloadSnafu, EmptyDownloadSnafu, FeedSnafu, ManifestSnafu, TempFileSnafu};

/// Version stamped in at release time; local builds report "dev".
pub const VERSION: &str = match option_env!("KEEL_RELEASE_VERSION") {
    Some(v) => v,
    None => "dev",
};

const DEV_VERSION: &str = "dev";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The running platform, named the way release assets are named.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    pub fn asset_name(&self) -> String {
        let ext = if self.os == "windows" { ".exe" } else { "" };
        format!("keel-{}-{}{}", self.os, self.arch, ext)
    }
}

/// A newer keel binary published for this platform.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableUpdate {
    pub version: String,
    pub tag: String,
    pub asset: Asset,
    pub checksums: Option<Asset>,
    pub changelog: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Local builds never self-update.
    DevBuild,
    UpToDate { current: String },
    Updated {
        from: String,
        to: String,
        path: PathBuf,
        verified: bool,
    },
}

fn bare_version(v: &str) -> &str {
    v.trim().trim_start_matches('v')
}

pub struct Updater<S> {
    source: S,
    current: String,
    platform: Platform,
    exe_path: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
}

impl<S: ReleaseSource> Updater<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: VERSION.to_string(),
            platform: Platform::current(),
            exe_path: None,
            temp_dir: None,
        }
    }

    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current = version.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Binary to replace; defaults to the running executable.
    pub fn with_exe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exe_path = Some(path.into());
        self
    }

    /// Directory for the download; defaults to the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn current_version(&self) -> &str {
        &self.current
    }

    /// Look for a newer installer release.
    ///
    /// Only the first `installer-v*` entry in feed order is considered. A release
    /// without an asset for this platform means there is nothing to install.
    pub async fn check(&self) -> Result<Option<AvailableUpdate>, SelfUpdateError> {
        if self.current == DEV_VERSION {
            return Ok(None);
        }

        let releases = self.source.releases().await.context(FeedSnafu)?;
        let Some(release) = releases.into_iter().find(|r| r.is_self_release()) else {
            tracing::debug!("feed has no installer release");
            return Ok(None);
        };

        let version = release
            .tag
            .strip_prefix(SELF_TAG_PREFIX)
            .unwrap_or(&release.tag)
            .to_string();
        if bare_version(&version) == bare_version(&self.current) {
            return Ok(None);
        }

        let asset_name = self.platform.asset_name();
        let Some(asset) = release.asset(&asset_name).cloned() else {
            tracing::debug!(asset = %asset_name, tag = %release.tag, "release has no asset for this platform");
            return Ok(None);
        };

        Ok(Some(AvailableUpdate {
            checksums: release.asset(MANIFEST_ASSET).cloned(),
            version,
            tag: release.tag,
            asset,
            changelog: release.changelog,
        }))
    }

    /// Download, verify and install the newest release.
    ///
    /// A checksum failure leaves the installed binary untouched.
    pub async fn perform(&self, diag: &mut Diagnostics) -> Result<UpdateOutcome, SelfUpdateError> {
        if self.current == DEV_VERSION {
            return Ok(UpdateOutcome::DevBuild);
        }
        let Some(update) = self.check().await? else {
            return Ok(UpdateOutcome::UpToDate {
                current: self.current.clone(),
            });
        };

        let exe = match &self.exe_path {
            Some(path) => path.clone(),
            None => std::env::current_exe().context(CurrentExeSnafu)?,
        };
        let dir = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);

        let download = tempfile::Builder::new()
            .prefix("keel-update-")
            .tempfile_in(&dir)
            .context(TempFileSnafu { dir: &dir })?;
        let mut file = tokio::fs::File::from_std(
            download.reopen().context(TempFileSnafu { dir: &dir })?,
        );

        tracing::info!(asset = %update.asset.name, version = %update.version, "downloading");
        let written = self
            .source
            .download(&update.asset.download_url, &mut file)
            .await
            .context(DownloadSnafu {
                asset: &update.asset.name,
            })?;
        drop(file);
        ensure!(
            written > 0,
            EmptyDownloadSnafu {
                asset: &update.asset.name
            }
        );

        let verified = match &update.checksums {
            Some(manifest) => {
                let text = self
                    .source
                    .fetch_text(&manifest.download_url)
                    .await
                    .context(ManifestSnafu)?;
                verify(download.path(), &text, &update.asset.name)?;
                true
            }
            None => {
                tracing::warn!(tag = %update.tag, "release publishes no checksums; installing unverified");
                false
            }
        };

        let download = download
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)
            .context(TempFileSnafu { dir: &dir })?;
        let swapped = swap_executable(&exe, &download, diag);
        diag.best_effort(
            WarningKind::TempFileRemoval,
            &format!("failed to remove {}", download.display()),
            swap::remove_if_exists(&download),
        );
        swapped?;

        Ok(UpdateOutcome::Updated {
            from: self.current.clone(),
            to: update.version,
            path: exe,
            verified,
        })
    }
}

/// Two-line notice for an available update.
pub fn notice(current: &str, update: &AvailableUpdate) -> String {
    format!(
        "keel {} is available (you have {})\nRun `keel self-update` to upgrade.",
        update.version, current
    )
}

/// Check for a newer keel in the background.
///
/// The task yields `None` on any failure or after `timeout`; it never reports errors.
pub fn spawn_notify(timeout: Duration) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let source = match FeedClient::from_env() {
            Ok(source) => source,
            Err(e) => {
                tracing::debug!("update check skipped: {}", e);
                return None;
            }
        };
        let updater = Updater::new(source);
        match tokio::time::timeout(timeout, updater.check()).await {
            Ok(Ok(Some(update))) => Some(notice(updater.current_version(), &update)),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::debug!("update check failed: {}", e);
                None
            }
            Err(_) => {
                tracing::debug!("update check timed out");
                None
            }
        }
    })
}
