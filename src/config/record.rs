// ABOUTME: Persisted description of one managed installation.
// ABOUTME: The version field always names the tag that is currently running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::types::{Channel, DeploymentName};

/// Database engine run as a bundled container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    #[default]
    Mariadb,
    Postgres,
}

impl DbEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbEngine::Mariadb => "mariadb",
            DbEngine::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bundled database container, or an operator-managed server reached by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DatabaseMode {
    Bundled { engine: DbEngine },
    External { url: String },
}

impl Default for DatabaseMode {
    fn default() -> Self {
        DatabaseMode::Bundled {
            engine: DbEngine::default(),
        }
    }
}

impl DatabaseMode {
    pub fn bundled_engine(&self) -> Option<DbEngine> {
        match self {
            DatabaseMode::Bundled { engine } => Some(*engine),
            DatabaseMode::External { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheEngine {
    /// In-process cache inside the application container.
    #[default]
    Apcu,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub engine: CacheEngine,
    /// External Redis; when absent with the redis engine a cache container is bundled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

impl CacheConfig {
    pub fn bundles_redis(&self) -> bool {
        self.engine == CacheEngine::Redis && self.redis_url.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    S3,
    Azure,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::S3 => "s3",
            StorageKind::Azure => "azure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// Provider specific settings such as `s3_bucket` or `azure_container`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPolicy {
    #[serde(default = "default_backup_enabled")]
    pub enabled: bool,
    /// Cron expression, consumed by the operator's scheduler.
    #[serde(default = "default_backup_schedule")]
    pub schedule: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_backup_enabled() -> bool {
    true
}

fn default_backup_schedule() -> String {
    "0 3 * * *".to_string()
}

fn default_retention_days() -> u32 {
    30
}

impl Default for BackupPolicy {
    fn default() -> Self {
        BackupPolicy {
            enabled: default_backup_enabled(),
            schedule: default_backup_schedule(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: DeploymentName,
    /// Registry identifier of the backend, e.g. `docker`.
    pub provider: String,
    #[serde(default)]
    pub channel: Channel,
    pub domain: String,
    /// Image repository without tag.
    pub image: String,
    /// Tag currently running.
    pub version: String,
    /// Last-known-good tag before the most recent update or rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    #[serde(default)]
    pub database: DatabaseMode,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub backup: BackupPolicy,
    pub work_dir: PathBuf,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_mode_is_tagged() {
        let yaml = serde_yaml::to_string(&DatabaseMode::External {
            url: "mysql://db.internal/app".to_string(),
        })
        .unwrap();
        assert!(yaml.contains("mode: external"));

        let parsed: DatabaseMode = serde_yaml::from_str("mode: bundled\nengine: postgres\n").unwrap();
        assert_eq!(parsed.bundled_engine(), Some(DbEngine::Postgres));
    }

    #[test]
    fn redis_without_url_is_bundled() {
        let cache = CacheConfig {
            engine: CacheEngine::Redis,
            redis_url: None,
        };
        assert!(cache.bundles_redis());
        assert!(!CacheConfig::default().bundles_redis());
    }

    #[test]
    fn backup_policy_defaults() {
        let policy: BackupPolicy = serde_yaml::from_str("enabled: false").unwrap();
        assert!(!policy.enabled);
        assert_eq!(policy.schedule, "0 3 * * *");
        assert_eq!(policy.retention_days, 30);
    }
}
