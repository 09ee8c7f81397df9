// ABOUTME: Deployment target abstraction: one contract driven identically for every backend.
// ABOUTME: Backends are a closed set selected through a registry of identifier to constructor.

pub mod compose;
mod unsupported;

pub use compose::ComposeProvider;
pub use unsupported::UnsupportedTarget;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{
    BackupPolicy, CacheConfig, DatabaseMode, DeploymentRecord, HealthPolicy, RecordStore,
    StorageConfig,
};
use crate::deploy::DeployError;
use crate::diagnostics::Warning;
use crate::runner::LineStream;
use crate::types::{BackupId, Channel, DeploymentName};

/// Backend identifiers known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Docker,
    Vps,
    Azure,
    Aws,
    Fly,
    Railway,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Docker,
        ProviderKind::Vps,
        ProviderKind::Azure,
        ProviderKind::Aws,
        ProviderKind::Fly,
        ProviderKind::Railway,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Docker => "docker",
            ProviderKind::Vps => "vps",
            ProviderKind::Azure => "azure",
            ProviderKind::Aws => "aws",
            ProviderKind::Fly => "fly",
            ProviderKind::Railway => "railway",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Docker => "Docker Compose (local)",
            ProviderKind::Vps => "VPS over SSH",
            ProviderKind::Azure => "Azure Container Apps",
            ProviderKind::Aws => "AWS ECS Fargate",
            ProviderKind::Fly => "Fly.io",
            ProviderKind::Railway => "Railway",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.id() == wanted)
            .ok_or_else(|| DeployError::UnknownProvider(s.to_string()))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One advisory readiness check. Unmet prerequisites never block an operation.
#[derive(Debug, Clone, Serialize)]
pub struct Prerequisite {
    pub name: String,
    pub description: String,
    pub met: bool,
    pub hint: String,
}

/// Everything Install needs to bring up a new deployment.
#[derive(Debug, Clone)]
pub struct InstallSpec {
    pub name: DeploymentName,
    pub channel: Channel,
    /// Image repository without tag.
    pub image: String,
    pub tag: String,
    pub domain: String,
    pub database: DatabaseMode,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub backup: BackupPolicy,
}

/// Point-in-time view of a deployment for `keel status`.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStatus {
    pub name: String,
    pub provider: String,
    pub domain: String,
    pub channel: Channel,
    /// Tag in the deployment record.
    pub version: String,
    /// Version the running service reports, when reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_version: Option<String>,
    pub running: bool,
    pub healthy: bool,
    pub db_connected: bool,
    pub cache_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<BackupId>,
    pub last_update: DateTime<Utc>,
}

/// A compressed database dump on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub id: BackupId,
    pub size: u64,
    pub path: PathBuf,
}

/// The capability set every backend implements.
///
/// An operation that mutates external state and then fails either compensates
/// before returning or leaves the persisted record untouched.
#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Human-readable backend name.
    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Whether the backend's tooling is present. Has no side effects.
    fn detect(&self) -> bool;

    async fn prerequisites(&self) -> Vec<Prerequisite>;

    async fn install(&mut self, spec: &InstallSpec) -> Result<DeploymentRecord, DeployError>;

    async fn update(&mut self, version: &str) -> Result<DeploymentRecord, DeployError>;

    async fn status(&self) -> Result<DeploymentStatus, DeployError>;

    async fn logs(&self, follow: bool) -> Result<LineStream, DeployError>;

    async fn backup(&mut self) -> Result<BackupArtifact, DeployError>;

    /// Artifacts sorted oldest first.
    async fn list_backups(&self) -> Result<Vec<BackupArtifact>, DeployError>;

    async fn restore(&mut self, backup_id: &str) -> Result<(), DeployError>;

    async fn rollback(&mut self) -> Result<DeploymentRecord, DeployError>;

    /// Tear the stack down and forget the record.
    async fn destroy(&mut self) -> Result<(), DeployError>;

    /// Drain non-fatal warnings gathered by earlier calls.
    fn take_warnings(&mut self) -> Vec<Warning>;
}

/// What a backend constructor receives.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub store: RecordStore,
    pub name: DeploymentName,
    pub work_dir: PathBuf,
    pub policy: HealthPolicy,
    /// Break a held deploy lock.
    pub force_lock: bool,
}

/// A constructed backend.
pub enum Backend {
    Compose(ComposeProvider),
    Unsupported(UnsupportedTarget),
}

impl Deref for Backend {
    type Target = dyn DeploymentTarget;

    fn deref(&self) -> &Self::Target {
        match self {
            Backend::Compose(p) => p,
            Backend::Unsupported(p) => p,
        }
    }
}

impl DerefMut for Backend {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Backend::Compose(p) => p,
            Backend::Unsupported(p) => p,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

type Constructor = fn(ProviderContext) -> Result<Backend, DeployError>;

const REGISTRY: [(ProviderKind, Constructor); 6] = [
    (ProviderKind::Docker, compose_backend),
    (ProviderKind::Vps, vps_backend),
    (ProviderKind::Azure, azure_backend),
    (ProviderKind::Aws, aws_backend),
    (ProviderKind::Fly, fly_backend),
    (ProviderKind::Railway, railway_backend),
];

fn compose_backend(ctx: ProviderContext) -> Result<Backend, DeployError> {
    ComposeProvider::new(ctx).map(Backend::Compose)
}

fn vps_backend(_: ProviderContext) -> Result<Backend, DeployError> {
    Ok(Backend::Unsupported(UnsupportedTarget::new(ProviderKind::Vps)))
}

fn azure_backend(_: ProviderContext) -> Result<Backend, DeployError> {
    Ok(Backend::Unsupported(UnsupportedTarget::new(ProviderKind::Azure)))
}

fn aws_backend(_: ProviderContext) -> Result<Backend, DeployError> {
    Ok(Backend::Unsupported(UnsupportedTarget::new(ProviderKind::Aws)))
}

fn fly_backend(_: ProviderContext) -> Result<Backend, DeployError> {
    Ok(Backend::Unsupported(UnsupportedTarget::new(ProviderKind::Fly)))
}

fn railway_backend(_: ProviderContext) -> Result<Backend, DeployError> {
    Ok(Backend::Unsupported(UnsupportedTarget::new(ProviderKind::Railway)))
}

/// Construct the backend registered under `id`.
pub fn create(id: &str, ctx: ProviderContext) -> Result<Backend, DeployError> {
    let kind: ProviderKind = id.parse()?;
    let (_, constructor) = REGISTRY
        .iter()
        .find(|(k, _)| *k == kind)
        .ok_or_else(|| DeployError::UnknownProvider(id.to_string()))?;
    tracing::debug!(provider = %kind, deployment = %ctx.name, "constructing backend");
    constructor(ctx)
}
