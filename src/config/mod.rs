// ABOUTME: Configuration paths, deployment records and their on-disk store.
// ABOUTME: Resolves the per-user config directory with an environment override.

mod healthcheck;
mod record;
mod store;

pub use healthcheck::HealthPolicy;
pub use record::{
    BackupPolicy, CacheConfig, CacheEngine, DatabaseMode, DbEngine, DeploymentRecord,
    StorageConfig, StorageKind,
};
pub use store::{RecordStore, StoreError, StoreFile};

use std::path::PathBuf;

use crate::types::DeploymentName;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "KEEL_CONFIG_DIR";

pub const STORE_FILENAME: &str = "deployments.yml";

/// Get the keel configuration directory.
///
/// Resolution order:
/// 1. `KEEL_CONFIG_DIR` environment variable
/// 2. the platform config directory (`~/.config/keel` on Linux)
/// 3. `.keel` in the current directory when no home is known
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .map(|d| d.join("keel"))
        .unwrap_or_else(|| PathBuf::from(".keel"))
}

/// Path of the deployment records file.
pub fn store_path() -> PathBuf {
    config_dir().join(STORE_FILENAME)
}

/// Working directory for a deployment's templates, secrets and backups.
pub fn default_work_dir(name: &DeploymentName) -> PathBuf {
    config_dir().join("deployments").join(name.as_str())
}
