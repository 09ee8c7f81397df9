// ABOUTME: Error types for deployment lifecycle operations.
// ABOUTME: Every variant maps to a DeployErrorKind so callers can branch without matching text.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::config::StoreError;
use crate::health::GateTimeout;
use crate::runner::RunnerError;
use crate::types::BackupIdError;

/// Errors that can occur while driving a deployment through its lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A record with this name already exists.
    #[error("deployment '{0}' is already installed; use `keel update` or `keel destroy` first")]
    AlreadyInstalled(String),

    /// Reading or writing deployment records failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unknown provider identifier.
    #[error("unknown provider '{0}' (known: docker, vps, azure, aws, fly, railway)")]
    UnknownProvider(String),

    /// A realized provider needs a tool that is not installed.
    #[error("{tool} not found on PATH. {hint}")]
    MissingTool { tool: String, hint: String },

    /// The provider does not implement this operation.
    #[error("{operation} is not supported by the {provider} provider yet")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    /// Operator input that cannot be acted on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Rollback has nothing to go back to.
    #[error("no previous version available for rollback")]
    NoPreviousVersion,

    /// Backups go through the bundled database container.
    #[error("the database is external; back it up and restore it with your database tooling")]
    ExternalDatabase,

    /// A backup with this id was already written.
    #[error("backup {0} already exists; wait a second and retry")]
    BackupExists(String),

    #[error(transparent)]
    InvalidBackupId(#[from] BackupIdError),

    /// No artifact for the requested id.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// An external command exited non-zero.
    #[error("{step} failed: {stderr}")]
    CommandFailed { step: String, stderr: String },

    /// An external command could not be run at all.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Install never became healthy. Containers are left running for inspection.
    #[error("health check failed: {source}. Inspect the stack with `keel logs`")]
    HealthGateTimeout {
        #[source]
        source: GateTimeout,
    },

    /// Update restarted on the new version but it never became healthy.
    #[error(
        "update to {version} applied but the health check failed: {source}. \
         The record still names the previous version; inspect with `keel logs` or run `keel rollback`"
    )]
    UpdateUnhealthy {
        version: String,
        #[source]
        source: GateTimeout,
    },

    /// Rollback restarted on the older version but it never became healthy.
    #[error("rollback to {version} applied but the health check failed: {source}. Inspect with `keel logs`")]
    RollbackUnhealthy {
        version: String,
        #[source]
        source: GateTimeout,
    },

    /// The environment file no longer carries an entry keel manages.
    #[error("{} has no {key} entry; was it edited by hand?", path.display())]
    EnvFileDrift { path: PathBuf, key: &'static str },

    /// Local file operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Deploy lock is held by another process.
    #[error("deploy lock held by {holder} (pid {pid}) since {started_at}; rerun with --force to break it")]
    LockHeld {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    /// Failed to take or release the deploy lock.
    #[error("deploy lock error: {0}")]
    Lock(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// Nothing was attempted: the request cannot apply to the current state.
    Precondition,
    /// Another operation holds the deploy lock.
    LockHeld,
    /// An external command failed or could not run.
    CommandFailed,
    /// The service never became healthy; retrying may succeed.
    HealthTimeout,
    /// The addressed backup does not exist.
    NotFound,
    /// Local filesystem or record store failure.
    Io,
}

/// Details of the process holding a deploy lock.
#[derive(Debug, Clone)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::AlreadyInstalled(_)
            | DeployError::UnknownProvider(_)
            | DeployError::MissingTool { .. }
            | DeployError::Unsupported { .. }
            | DeployError::InvalidInput(_)
            | DeployError::NoPreviousVersion
            | DeployError::ExternalDatabase
            | DeployError::BackupExists(_)
            | DeployError::InvalidBackupId(_)
            | DeployError::EnvFileDrift { .. } => DeployErrorKind::Precondition,
            DeployError::Store(e) if e.is_not_installed() => DeployErrorKind::Precondition,
            DeployError::Store(StoreError::Ambiguous(_)) => DeployErrorKind::Precondition,
            DeployError::Store(_) | DeployError::Io { .. } | DeployError::Lock(_) => {
                DeployErrorKind::Io
            }
            DeployError::BackupNotFound(_) => DeployErrorKind::NotFound,
            DeployError::CommandFailed { .. } | DeployError::Runner(_) => {
                DeployErrorKind::CommandFailed
            }
            DeployError::HealthGateTimeout { .. }
            | DeployError::UpdateUnhealthy { .. }
            | DeployError::RollbackUnhealthy { .. } => DeployErrorKind::HealthTimeout,
            DeployError::LockHeld { .. } => DeployErrorKind::LockHeld,
        }
    }

    /// Health gate timeouts are the only failures worth retrying unchanged.
    pub fn is_retriable(&self) -> bool {
        self.kind() == DeployErrorKind::HealthTimeout
    }

    pub fn lock_holder_info(&self) -> Option<LockHolderInfo> {
        match self {
            DeployError::LockHeld {
                holder,
                pid,
                started_at,
            } => Some(LockHolderInfo {
                holder: holder.clone(),
                pid: *pid,
                started_at: *started_at,
            }),
            _ => None,
        }
    }

    pub(crate) fn lock_held(holder: String, pid: u32, started_at: DateTime<Utc>) -> Self {
        DeployError::LockHeld {
            holder,
            pid,
            started_at,
        }
    }

    pub(crate) fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DeployError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn command_failed(step: impl Into<String>, stderr: impl Into<String>) -> Self {
        DeployError::CommandFailed {
            step: step.into(),
            stderr: stderr.into(),
        }
    }
}
