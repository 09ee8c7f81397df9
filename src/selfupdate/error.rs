// ABOUTME: Self-update error types with SNAFU pattern.
// ABOUTME: Groups failures into network, integrity and filesystem kinds for programmatic handling.

use snafu::Snafu;
use std::path::PathBuf;

use crate::registry::RegistryError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SelfUpdateError {
    #[snafu(display("failed to query releases: {source}"))]
    Feed { source: RegistryError },

    #[snafu(display("failed to download {asset}: {source}"))]
    Download {
        asset: String,
        source: RegistryError,
    },

    #[snafu(display("downloaded {asset} is empty"))]
    EmptyDownload { asset: String },

    #[snafu(display("failed to fetch checksums: {source}"))]
    Manifest { source: RegistryError },

    #[snafu(display("no checksum listed for {asset}"))]
    MissingChecksum { asset: String },

    #[snafu(display("checksum mismatch for {asset}: expected {expected}, got {actual}"))]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    #[snafu(display("cannot determine the running executable: {source}"))]
    CurrentExe { source: std::io::Error },

    #[snafu(display("failed to create a temporary file in {}: {source}", dir.display()))]
    TempFile {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to hash {}: {source}", path.display()))]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to stage new binary at {}: {source}", path.display()))]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to set permissions on {}: {source}", path.display()))]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to move {} aside: {source}", path.display()))]
    MoveAside {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to install new binary at {} (previous binary restored): {source}", path.display()))]
    Install {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfUpdateErrorKind {
    /// The feed or an asset could not be fetched.
    Network,
    /// The download is empty or does not match its published checksum.
    Integrity,
    /// A local file operation failed.
    Filesystem,
}

impl SelfUpdateError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> SelfUpdateErrorKind {
        match self {
            SelfUpdateError::Feed { .. }
            | SelfUpdateError::Download { .. }
            | SelfUpdateError::Manifest { .. } => SelfUpdateErrorKind::Network,
            SelfUpdateError::EmptyDownload { .. }
            | SelfUpdateError::MissingChecksum { .. }
            | SelfUpdateError::ChecksumMismatch { .. } => SelfUpdateErrorKind::Integrity,
            SelfUpdateError::CurrentExe { .. }
            | SelfUpdateError::TempFile { .. }
            | SelfUpdateError::Hash { .. }
            | SelfUpdateError::Stage { .. }
            | SelfUpdateError::Permissions { .. }
            | SelfUpdateError::MoveAside { .. }
            | SelfUpdateError::Install { .. } => SelfUpdateErrorKind::Filesystem,
        }
    }
}
