// ABOUTME: YAML-backed store of deployment records keyed by deployment name.
// ABOUTME: Every write replaces the file atomically via a temp sibling and rename.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{DeploymentRecord, HealthPolicy};
use crate::types::DeploymentName;

const STORE_LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize deployment records: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("no deployment named '{0}'. Run `keel install` first")]
    NotInstalled(String),

    #[error("no deployment found. Run `keel install` first")]
    NoDeployments,

    #[error("several deployments exist ({}); pick one with --name", .0.join(", "))]
    Ambiguous(Vec<String>),
}

/// On-disk layout of the store file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub health: HealthPolicy,
    #[serde(default)]
    pub deployments: BTreeMap<DeploymentName, DeploymentRecord>,
}

/// Read-modify-write access to the deployment records file.
///
/// Mutations hold an exclusive lock on a `.lock` sibling for the whole
/// read-modify-write, so writers addressing different deployments never drop
/// each other's records. Readers take no lock; the atomic rename keeps them
/// from seeing a torn file.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default per-user location.
    pub fn open_default() -> Self {
        Self::new(super::store_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole file. A missing file is an empty store.
    pub fn load(&self) -> Result<StoreFile, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreFile::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(StoreFile::default());
        }

        serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn parent_dir(&self) -> Result<PathBuf, StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| self.io_err(e))?;
        Ok(parent)
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(STORE_LOCK_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Run `change` against a freshly loaded file while holding the store lock.
    /// The file is written back when `change` reports a modification.
    fn modify<T>(&self, change: impl FnOnce(&mut StoreFile) -> (T, bool)) -> Result<T, StoreError> {
        self.parent_dir()?;
        let lock_path = self.lock_path();
        let guard = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Io {
                path: lock_path.clone(),
                source,
            })?;
        guard.lock().map_err(|source| StoreError::Io {
            path: lock_path,
            source,
        })?;

        let mut file = self.load()?;
        let (value, changed) = change(&mut file);
        if changed {
            self.save(&file)?;
        }
        // closing the handle releases the lock
        drop(guard);
        Ok(value)
    }

    pub fn save(&self, file: &StoreFile) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(file).map_err(StoreError::Serialize)?;
        let io_err = |source| self.io_err(source);
        let parent = self.parent_dir()?;

        // NamedTempFile is created owner-only, which suits records holding database URLs.
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        tmp.write_all(yaml.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        tracing::debug!(path = %self.path.display(), "saved deployment records");
        Ok(())
    }

    pub fn get(&self, name: &DeploymentName) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self.load()?.deployments.remove(name))
    }

    /// Resolve the record an operation should address.
    ///
    /// An explicit name must exist. Without one, `default` wins, then a sole record.
    pub fn resolve(&self, name: Option<&DeploymentName>) -> Result<DeploymentRecord, StoreError> {
        let mut deployments = self.load()?.deployments;

        if let Some(name) = name {
            return deployments
                .remove(name)
                .ok_or_else(|| StoreError::NotInstalled(name.to_string()));
        }

        if let Some(record) = deployments.remove(&DeploymentName::default()) {
            return Ok(record);
        }

        match deployments.len() {
            0 => Err(StoreError::NoDeployments),
            1 => Ok(deployments.into_values().next().ok_or(StoreError::NoDeployments)?),
            _ => Err(StoreError::Ambiguous(
                deployments.keys().map(|k| k.to_string()).collect(),
            )),
        }
    }

    /// Insert or replace the record under its own name.
    pub fn put(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.modify(|file| {
            file.deployments.insert(record.name.clone(), record.clone());
            ((), true)
        })
    }

    /// Remove a record. Returns whether it existed.
    pub fn remove(&self, name: &DeploymentName) -> Result<bool, StoreError> {
        self.modify(|file| {
            let existed = file.deployments.remove(name).is_some();
            (existed, existed)
        })
    }

    pub fn health_policy(&self) -> Result<HealthPolicy, StoreError> {
        Ok(self.load()?.health)
    }

    pub fn names(&self) -> Result<Vec<DeploymentName>, StoreError> {
        Ok(self.load()?.deployments.into_keys().collect())
    }
}

impl StoreError {
    /// True when the failure means "nothing is installed under that name".
    pub fn is_not_installed(&self) -> bool {
        matches!(
            self,
            StoreError::NotInstalled(_) | StoreError::NoDeployments
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackupPolicy, CacheConfig, DatabaseMode, StorageConfig};
    use crate::types::Channel;
    use chrono::Utc;

    fn record(name: &str, version: &str) -> DeploymentRecord {
        DeploymentRecord {
            name: DeploymentName::new(name).unwrap(),
            provider: "docker".to_string(),
            channel: Channel::Release,
            domain: "localhost".to_string(),
            image: "ghcr.io/x/y".to_string(),
            version: version.to_string(),
            previous_version: None,
            database: DatabaseMode::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            backup: BackupPolicy::default(),
            work_dir: PathBuf::from("/tmp/keel"),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments.yml"));
        assert!(store.load().unwrap().deployments.is_empty());
        assert!(matches!(store.resolve(None), Err(StoreError::NoDeployments)));
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("nested/deployments.yml"));
        store.put(&record("default", "1.0.0")).unwrap();

        let loaded = store
            .get(&DeploymentName::default())
            .unwrap()
            .expect("record should exist");
        assert_eq!(loaded.version, "1.0.0");
    }

    #[test]
    fn resolve_prefers_default_then_sole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments.yml"));

        store.put(&record("staging", "2.0.0")).unwrap();
        assert_eq!(store.resolve(None).unwrap().name.as_str(), "staging");

        store.put(&record("prod", "1.0.0")).unwrap();
        assert!(matches!(store.resolve(None), Err(StoreError::Ambiguous(_))));

        store.put(&record("default", "3.0.0")).unwrap();
        assert_eq!(store.resolve(None).unwrap().version, "3.0.0");
    }

    #[test]
    fn explicit_name_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments.yml"));
        store.put(&record("default", "1.0.0")).unwrap();

        let err = store
            .resolve(Some(&DeploymentName::new("prod").unwrap()))
            .unwrap_err();
        assert!(err.is_not_installed());
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments.yml"));
        store.put(&record("default", "1.0.0")).unwrap();

        assert!(store.remove(&DeploymentName::default()).unwrap());
        assert!(!store.remove(&DeploymentName::default()).unwrap());
    }

    #[test]
    fn health_policy_can_be_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.yml");
        std::fs::write(&path, "health:\n  timeout: 30s\n").unwrap();

        let policy = RecordStore::new(path).health_policy().unwrap();
        assert_eq!(policy.timeout, std::time::Duration::from_secs(30));
        assert_eq!(policy.interval, std::time::Duration::from_secs(3));
    }

    #[test]
    fn concurrent_writers_keep_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments.yml"));

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for round in 0..10 {
                        store
                            .put(&record(&format!("site-{i}"), &format!("1.0.{round}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let names = store.names().unwrap();
        assert_eq!(names.len(), 8);
        for i in 0..8 {
            let name = DeploymentName::new(&format!("site-{i}")).unwrap();
            assert_eq!(store.get(&name).unwrap().unwrap().version, "1.0.9");
        }
        assert!(dir.path().join("deployments.yml.lock").exists());
    }
}
