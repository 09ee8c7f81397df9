// ABOUTME: Deploy lock to prevent concurrent lifecycle operations on one deployment.
// ABOUTME: Uses atomic create-new of .keel.lock in the working directory with holder info as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::DeploymentName;

use super::DeployError;

/// Lock file name inside a deployment's working directory.
pub const LOCK_FILENAME: &str = ".keel.lock";

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Deployment being operated on.
    pub deployment: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(deployment: &DeploymentName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            deployment: deployment.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a working directory.
    pub fn lock_path(work_dir: &Path) -> PathBuf {
        work_dir.join(LOCK_FILENAME)
    }
}

/// A held deploy lock that releases on drop.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    released: bool,
}

impl DeployLock {
    /// Acquire the deploy lock for a deployment's working directory.
    ///
    /// Creation uses `create_new`, so two processes racing for the same lock
    /// cannot both win. Stale locks (>1 hour) are auto-broken with a warning;
    /// `force` breaks any lock.
    pub fn acquire(
        work_dir: &Path,
        deployment: &DeploymentName,
        force: bool,
    ) -> Result<Self, DeployError> {
        std::fs::create_dir_all(work_dir).map_err(|e| {
            DeployError::lock_error(format!(
                "failed to create {}: {}",
                work_dir.display(),
                e
            ))
        })?;

        let path = LockInfo::lock_path(work_dir);
        let info = LockInfo::new(deployment);
        let json = serde_json::to_string(&info)
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        match Self::try_create(&path, &json) {
            Ok(()) => return Ok(Self::held(path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to acquire lock: {}",
                    e
                )));
            }
        }

        if let Some(existing) = Self::check_existing_lock(&path, force) {
            return Err(DeployError::lock_held(
                existing.holder,
                existing.pid,
                existing.started_at,
            ));
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        if let Err(e) = std::fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(DeployError::lock_error(format!(
                "failed to break lock: {}",
                e
            )));
        }

        match Self::try_create(&path, &json) {
            Ok(()) => Ok(Self::held(path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(
                DeployError::lock_error("lock acquired by another process during break"),
            ),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to acquire lock: {}",
                e
            ))),
        }
    }

    fn held(path: PathBuf) -> Self {
        tracing::debug!(path = %path.display(), "deploy lock acquired");
        Self {
            path,
            released: false,
        }
    }

    fn try_create(path: &Path, json: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()
    }

    /// Returns the holder when the existing lock must be respected,
    /// `None` when it is stale, forced, or unreadable and may be broken.
    fn check_existing_lock(path: &Path, force: bool) -> Option<LockInfo> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::warn!("Lock info unreadable, breaking lock");
                return None;
            }
        };

        match serde_json::from_str::<LockInfo>(&content) {
            Ok(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                None
            }
            Ok(existing) if existing.is_stale() => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                None
            }
            Ok(existing) => Some(existing),
            Err(_) => {
                tracing::warn!("Lock info corrupted, breaking lock");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting a failure to remove the file.
    pub fn release(mut self) -> Result<(), DeployError> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("failed to release deploy lock {}: {}", self.path.display(), e);
        }
    }
}
