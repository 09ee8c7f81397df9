// ABOUTME: Temporary keel workspace: record store, work dir and a compose provider over fakes.
// ABOUTME: Health timing is shortened so gate failures resolve quickly.

use keel::config::{
    BackupPolicy, CacheConfig, DatabaseMode, DbEngine, DeploymentRecord, HealthPolicy,
    RecordStore, StorageConfig,
};
use keel::provider::{ComposeProvider, InstallSpec, ProviderContext};
use keel::types::{Channel, DeploymentName};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use super::fake_runner::FakeRunner;
use super::probe::ScriptedProbe;

pub struct Workspace {
    _dir: TempDir,
    pub store: RecordStore,
    pub work_dir: PathBuf,
    pub name: DeploymentName,
}

pub fn fast_policy() -> HealthPolicy {
    HealthPolicy {
        timeout: Duration::from_secs(10),
        interval: Duration::from_secs(3),
        probe_timeout: Duration::from_secs(1),
    }
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("deployments.yml"));
        let work_dir = dir.path().join("deployments").join("default");
        Self {
            _dir: dir,
            store,
            work_dir,
            name: DeploymentName::default(),
        }
    }

    pub fn context(&self) -> ProviderContext {
        ProviderContext {
            store: self.store.clone(),
            name: self.name.clone(),
            work_dir: self.work_dir.clone(),
            policy: fast_policy(),
            force_lock: false,
        }
    }

    pub fn provider(
        &self,
        runner: &FakeRunner,
        probe: &ScriptedProbe,
    ) -> ComposeProvider<FakeRunner, ScriptedProbe> {
        ComposeProvider::with_parts(self.context(), runner.clone(), probe.clone())
    }

    pub fn env_file(&self) -> PathBuf {
        self.work_dir.join(keel::provider::compose::ENV_FILENAME)
    }

    pub fn env_value(&self, key: &str) -> Option<String> {
        let content = std::fs::read_to_string(self.env_file()).ok()?;
        keel::provider::compose::parse_value(&content, key)
    }

    pub fn image_tag(&self) -> Option<String> {
        self.env_value(keel::provider::compose::IMAGE_TAG_KEY)
    }

    pub fn record(&self) -> Option<DeploymentRecord> {
        self.store.get(&self.name).unwrap()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

pub fn install_spec(tag: &str) -> InstallSpec {
    InstallSpec {
        name: DeploymentName::default(),
        channel: Channel::Release,
        image: "ghcr.io/x/y".to_string(),
        tag: tag.to_string(),
        domain: "localhost".to_string(),
        database: DatabaseMode::Bundled {
            engine: DbEngine::Mariadb,
        },
        storage: StorageConfig::default(),
        cache: CacheConfig::default(),
        backup: BackupPolicy::default(),
    }
}
