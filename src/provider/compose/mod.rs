// ABOUTME: Local Docker Compose backend: the fully realized deployment target.
// ABOUTME: Drives install, update, rollback, backup and restore through `docker compose` in the work dir.

mod backup;
mod envfile;
mod secrets;
mod templates;

pub use backup::BACKUP_DIR;
pub use envfile::{ENV_FILENAME, IMAGE_TAG_KEY, parse_value};
pub use secrets::Secrets;
pub use templates::{CADDYFILE_FILENAME, COMPOSE_FILENAME};

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};

use super::{
    BackupArtifact, DeploymentStatus, DeploymentTarget, InstallSpec, Prerequisite,
    ProviderContext, ProviderKind,
};
use crate::config::{DbEngine, DeploymentRecord};
use crate::deploy::{DeployError, DeployLock};
use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::health::{self, HealthProbe, HttpProber};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, LineStream, SystemRunner};
use crate::types::BackupId;
use templates::TemplateVars;

const DOCKER: &str = "docker";
const DOCKER_HINT: &str = "Install Docker: https://docs.docker.com/engine/install/";
const LOG_TAIL: &str = "100";

/// Compose backend, generic over how it runs commands and probes health.
pub struct ComposeProvider<R = SystemRunner, H = HttpProber> {
    ctx: ProviderContext,
    runner: R,
    probe: H,
    diagnostics: Diagnostics,
}

impl ComposeProvider {
    /// Provider backed by real processes and HTTP probes.
    pub fn new(ctx: ProviderContext) -> Result<Self, DeployError> {
        let probe = HttpProber::new(ctx.policy.probe_timeout)
            .map_err(|e| DeployError::io("failed to prepare health prober", std::io::Error::other(e)))?;
        Ok(Self::with_parts(ctx, SystemRunner::new(), probe))
    }
}

impl<R: CommandRunner, H: HealthProbe> ComposeProvider<R, H> {
    pub fn with_parts(ctx: ProviderContext, runner: R, probe: H) -> Self {
        Self {
            ctx,
            runner,
            probe,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.ctx.work_dir
    }

    fn env_path(&self) -> PathBuf {
        self.ctx.work_dir.join(ENV_FILENAME)
    }

    fn compose(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new(DOCKER)
            .arg("compose")
            .args(args.iter().copied())
            .current_dir(&self.ctx.work_dir)
    }

    fn require_docker(&self) -> Result<(), DeployError> {
        if self.runner.find_program(DOCKER).is_none() {
            return Err(DeployError::MissingTool {
                tool: DOCKER.to_string(),
                hint: DOCKER_HINT.to_string(),
            });
        }
        Ok(())
    }

    /// Run a compose subcommand, turning a non-zero exit into `CommandFailed`.
    async fn run_step(&self, step: &str, spec: CommandSpec) -> Result<CommandOutput, DeployError> {
        tracing::info!(deployment = %self.ctx.name, "{}", step);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            return Err(DeployError::command_failed(step, output.failure_text()));
        }
        Ok(output)
    }

    /// Pull images and recreate the stack.
    async fn pull_and_up(&self) -> Result<(), DeployError> {
        self.run_step("docker compose pull", self.compose(&["pull"]))
            .await?;
        self.run_step("docker compose up", self.compose(&["up", "-d"]))
            .await?;
        Ok(())
    }

    fn record(&self) -> Result<DeploymentRecord, DeployError> {
        self.ctx
            .store
            .get(&self.ctx.name)?
            .ok_or_else(|| crate::config::StoreError::NotInstalled(self.ctx.name.to_string()).into())
    }

    /// Records read before this returns may be stale; the `do_*` steps re-read under the lock.
    fn lock(&self) -> Result<DeployLock, DeployError> {
        DeployLock::acquire(&self.ctx.work_dir, &self.ctx.name, self.ctx.force_lock)
    }

    fn unlock(&mut self, lock: DeployLock) {
        if let Err(e) = lock.release() {
            self.diagnostics.warn(Warning::lock_release(e.to_string()));
        }
    }

    async fn wait_healthy(&self, domain: &str) -> Result<health::HealthSnapshot, health::GateTimeout> {
        let url = health::base_url(domain);
        tracing::info!(deployment = %self.ctx.name, url = %url, "waiting for health");
        health::wait_for_healthy(&self.probe, &url, &self.ctx.policy).await
    }

    /// Point the env file at `to`, pull and restart. Any failure restores `from`.
    async fn switch_tag(&mut self, from: &str, to: &str) -> Result<(), DeployError> {
        let env_path = self.env_path();
        if from != to {
            envfile::replace_value(&env_path, IMAGE_TAG_KEY, from, to)?;
        }

        if let Err(e) = self.pull_and_up().await {
            if from != to {
                let restored = envfile::replace_value(&env_path, IMAGE_TAG_KEY, to, from);
                self.diagnostics.best_effort(
                    WarningKind::EnvRestore,
                    &format!("failed to restore {}={}", IMAGE_TAG_KEY, from),
                    restored,
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn write_templates(&self, spec: &InstallSpec) -> Result<(), DeployError> {
        let work_dir = &self.ctx.work_dir;
        std::fs::create_dir_all(work_dir)
            .map_err(|e| DeployError::io(format!("failed to create {}", work_dir.display()), e))?;
        envfile::set_mode(work_dir, 0o750)
            .map_err(|e| DeployError::io(format!("failed to restrict {}", work_dir.display()), e))?;

        let env_path = self.env_path();
        let existing = match std::fs::read_to_string(&env_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(DeployError::io(
                    format!("failed to read {}", env_path.display()),
                    e,
                ));
            }
        };
        if existing.is_some() {
            tracing::info!(path = %env_path.display(), "reusing secrets from earlier install attempt");
        }
        let secrets = Secrets::reuse_or_generate(existing.as_deref());

        let vars = TemplateVars {
            name: &spec.name,
            image: &spec.image,
            tag: &spec.tag,
            domain: &spec.domain,
            database: &spec.database,
            storage: &spec.storage,
            cache: &spec.cache,
            secrets: &secrets,
        };

        let files = [
            (ENV_FILENAME, templates::render_env(&vars), 0o600),
            (COMPOSE_FILENAME, templates::render_compose(&vars), 0o644),
            (CADDYFILE_FILENAME, templates::render_caddyfile(&vars), 0o644),
        ];
        for (name, content, mode) in files {
            let path = work_dir.join(name);
            envfile::write_file(&path, &content, mode)
                .map_err(|e| DeployError::io(format!("failed to write {}", path.display()), e))?;
        }
        Ok(())
    }

    fn bundled_engine(record: &DeploymentRecord) -> Result<DbEngine, DeployError> {
        record
            .database
            .bundled_engine()
            .ok_or(DeployError::ExternalDatabase)
    }

    async fn do_install(&mut self, spec: &InstallSpec) -> Result<DeploymentRecord, DeployError> {
        // Another install may have committed while we waited for the lock.
        if self.ctx.store.get(&spec.name)?.is_some() {
            return Err(DeployError::AlreadyInstalled(spec.name.to_string()));
        }
        self.write_templates(spec)?;
        self.pull_and_up().await?;

        self.wait_healthy(&spec.domain)
            .await
            .map_err(|source| DeployError::HealthGateTimeout { source })?;

        let record = DeploymentRecord {
            name: spec.name.clone(),
            provider: ProviderKind::Docker.id().to_string(),
            channel: spec.channel,
            domain: spec.domain.clone(),
            image: spec.image.clone(),
            version: spec.tag.clone(),
            previous_version: None,
            database: spec.database.clone(),
            storage: spec.storage.clone(),
            cache: spec.cache.clone(),
            backup: spec.backup.clone(),
            work_dir: self.ctx.work_dir.clone(),
            updated_at: Utc::now(),
        };
        self.ctx.store.put(&record)?;
        tracing::info!(deployment = %record.name, version = %record.version, "installed");
        Ok(record)
    }

    async fn do_update(&mut self, version: &str) -> Result<DeploymentRecord, DeployError> {
        let mut record = self.record()?;
        let current = envfile::require_value(&self.env_path(), IMAGE_TAG_KEY)?;
        if current == version && record.version == version {
            tracing::info!(deployment = %record.name, version, "already on requested version");
            return Ok(record);
        }

        self.switch_tag(&current, version).await?;

        self.wait_healthy(&record.domain)
            .await
            .map_err(|source| DeployError::UpdateUnhealthy {
                version: version.to_string(),
                source,
            })?;

        let last_good = std::mem::replace(&mut record.version, version.to_string());
        record.previous_version = Some(last_good);
        record.updated_at = Utc::now();
        self.ctx.store.put(&record)?;
        tracing::info!(deployment = %record.name, version, "updated");
        Ok(record)
    }

    async fn do_rollback(&mut self) -> Result<DeploymentRecord, DeployError> {
        let mut record = self.record()?;
        let current = envfile::require_value(&self.env_path(), IMAGE_TAG_KEY)?;
        let target = if current != record.version {
            record.version.clone()
        } else {
            match &record.previous_version {
                Some(previous) if *previous != record.version => previous.clone(),
                _ => return Err(DeployError::NoPreviousVersion),
            }
        };
        tracing::info!(deployment = %record.name, from = %current, to = %target, "rolling back");

        self.switch_tag(&current, &target).await?;

        record.version = target.clone();
        record.previous_version = Some(current);
        record.updated_at = Utc::now();
        self.ctx.store.put(&record)?;

        self.wait_healthy(&record.domain)
            .await
            .map_err(|source| DeployError::RollbackUnhealthy {
                version: target,
                source,
            })?;
        Ok(record)
    }

    async fn do_backup(&mut self) -> Result<BackupArtifact, DeployError> {
        let record = self.record()?;
        let engine = Self::bundled_engine(&record)?;
        let id = BackupId::now();
        if backup::artifact_path(&self.ctx.work_dir, &id).exists() {
            return Err(DeployError::BackupExists(id.to_string()));
        }

        let dump: &[&str] = match engine {
            DbEngine::Mariadb => &[
                "exec",
                "-T",
                "db",
                "mariadb-dump",
                "--all-databases",
                "--single-transaction",
            ],
            DbEngine::Postgres => &["exec", "-T", "db", "pg_dumpall", "-U", "postgres"],
        };
        let output = self.run_step("database dump", self.compose(dump)).await?;

        let artifact = backup::write_artifact(
            &self.ctx.work_dir,
            &id,
            &output.stdout,
            &mut self.diagnostics,
        )
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                DeployError::BackupExists(id.to_string())
            } else {
                DeployError::io(format!("failed to write backup {}", id), e)
            }
        })?;
        tracing::info!(backup = %artifact.id, size = artifact.size, "backup written");

        if record.backup.enabled {
            backup::prune(
                &self.ctx.work_dir,
                record.backup.retention_days,
                Utc::now(),
                &artifact.id,
                &mut self.diagnostics,
            );
        }
        Ok(artifact)
    }

    async fn do_destroy(&self) -> Result<(), DeployError> {
        self.record()?;
        self.run_step("docker compose down", self.compose(&["down", "-v"]))
            .await?;
        self.ctx.store.remove(&self.ctx.name)?;
        Ok(())
    }

    async fn do_restore(&mut self, engine: DbEngine, path: &Path) -> Result<(), DeployError> {
        let sql = backup::read_artifact(path)
            .map_err(|e| DeployError::io(format!("failed to read backup {}", path.display()), e))?;

        let client: &[&str] = match engine {
            DbEngine::Mariadb => &["exec", "-T", "db", "mariadb"],
            DbEngine::Postgres => &["exec", "-T", "db", "psql", "-U", "postgres", "-d", "postgres"],
        };
        self.run_step("database restore", self.compose(client).stdin(sql))
            .await?;
        Ok(())
    }
}

/// False only when another process is bound to `port`; lacking the
/// privilege to bind a low port does not mean it is taken.
fn port_available(port: u16) -> bool {
    match std::net::TcpListener::bind(("0.0.0.0", port)) {
        Ok(_) => true,
        Err(e) => e.kind() != std::io::ErrorKind::AddrInUse,
    }
}

#[async_trait]
impl<R, H> DeploymentTarget for ComposeProvider<R, H>
where
    R: CommandRunner + 'static,
    H: HealthProbe + 'static,
{
    fn kind(&self) -> ProviderKind {
        ProviderKind::Docker
    }

    fn detect(&self) -> bool {
        self.runner.find_program(DOCKER).is_some()
    }

    async fn prerequisites(&self) -> Vec<Prerequisite> {
        let succeeds = |args: &'static [&'static str]| async move {
            self.runner
                .run(&CommandSpec::new(DOCKER).args(args.iter().copied()))
                .await
                .map(|o| o.success())
                .unwrap_or(false)
        };

        vec![
            Prerequisite {
                name: "Docker".to_string(),
                description: "Docker Engine must be installed and running".to_string(),
                met: succeeds(&["info"]).await,
                hint: DOCKER_HINT.to_string(),
            },
            Prerequisite {
                name: "Docker Compose v2".to_string(),
                description: "The compose plugin drives the stack".to_string(),
                met: succeeds(&["compose", "version"]).await,
                hint: "Install the plugin: https://docs.docker.com/compose/install/".to_string(),
            },
            Prerequisite {
                name: "Port 80 available".to_string(),
                description: "HTTP port must be free for the reverse proxy".to_string(),
                met: port_available(80),
                hint: "Stop any service using port 80 (e.g. Apache, nginx)".to_string(),
            },
            Prerequisite {
                name: "Port 443 available".to_string(),
                description: "HTTPS port must be free for the reverse proxy".to_string(),
                met: port_available(443),
                hint: "Stop any service using port 443".to_string(),
            },
        ]
    }

    async fn install(&mut self, spec: &InstallSpec) -> Result<DeploymentRecord, DeployError> {
        if spec.tag.trim().is_empty() {
            return Err(DeployError::InvalidInput("image tag cannot be empty".to_string()));
        }
        if self.ctx.store.get(&spec.name)?.is_some() {
            return Err(DeployError::AlreadyInstalled(spec.name.to_string()));
        }
        self.require_docker()?;

        let lock = self.lock()?;
        let result = self.do_install(spec).await;
        self.unlock(lock);
        result
    }

    async fn update(&mut self, version: &str) -> Result<DeploymentRecord, DeployError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(DeployError::InvalidInput("version cannot be empty".to_string()));
        }
        self.record()?;
        self.require_docker()?;

        let lock = self.lock()?;
        let result = self.do_update(version).await;
        self.unlock(lock);
        result
    }

    async fn status(&self) -> Result<DeploymentStatus, DeployError> {
        let record = self.record()?;

        let url = health::base_url(&record.domain);
        let snapshot = tokio::time::timeout(self.ctx.policy.probe_timeout, self.probe.probe(&url))
            .await
            .ok()
            .and_then(Result::ok);

        let uptime = match self
            .runner
            .run(&self.compose(&["ps", "--format", "{{.Status}}"]))
            .await
        {
            Ok(output) if output.success() => output
                .stdout_lossy()
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string),
            Ok(_) | Err(_) => None,
        };

        let last_backup = backup::list_artifacts(&self.ctx.work_dir)
            .ok()
            .and_then(|artifacts| artifacts.into_iter().last())
            .map(|a| a.id);

        Ok(DeploymentStatus {
            name: record.name.to_string(),
            provider: record.provider.clone(),
            domain: record.domain.clone(),
            channel: record.channel,
            version: record.version.clone(),
            reported_version: snapshot
                .as_ref()
                .map(|s| s.version.clone())
                .filter(|v| !v.is_empty()),
            running: snapshot.is_some() || uptime.is_some(),
            healthy: snapshot.as_ref().is_some_and(|s| s.is_healthy()),
            db_connected: snapshot.as_ref().is_some_and(|s| s.db),
            cache_ok: snapshot.as_ref().is_some_and(|s| s.cache),
            uptime,
            last_backup,
            last_update: record.updated_at,
        })
    }

    async fn logs(&self, follow: bool) -> Result<LineStream, DeployError> {
        self.record()?;
        self.require_docker()?;

        let mut args = vec!["logs", "--tail", LOG_TAIL];
        if follow {
            args.push("--follow");
        }
        Ok(self.runner.stream(&self.compose(&args)).await?)
    }

    async fn backup(&mut self) -> Result<BackupArtifact, DeployError> {
        Self::bundled_engine(&self.record()?)?;
        self.require_docker()?;

        let lock = self.lock()?;
        let result = self.do_backup().await;
        self.unlock(lock);
        result
    }

    async fn list_backups(&self) -> Result<Vec<BackupArtifact>, DeployError> {
        self.record()?;
        backup::list_artifacts(&self.ctx.work_dir)
            .map_err(|e| DeployError::io("failed to list backups", e))
    }

    async fn restore(&mut self, backup_id: &str) -> Result<(), DeployError> {
        let id = BackupId::parse(backup_id.trim())?;
        let record = self.record()?;
        let engine = Self::bundled_engine(&record)?;

        let path = backup::artifact_path(&self.ctx.work_dir, &id);
        if !path.is_file() {
            return Err(DeployError::BackupNotFound(id.to_string()));
        }
        self.require_docker()?;

        let lock = self.lock()?;
        let result = self.do_restore(engine, &path).await;
        self.unlock(lock);
        if result.is_ok() {
            tracing::info!(backup = %id, "restored");
        }
        result
    }

    async fn rollback(&mut self) -> Result<DeploymentRecord, DeployError> {
        self.record()?;
        self.require_docker()?;

        let lock = self.lock()?;
        let result = self.do_rollback().await;
        self.unlock(lock);
        result
    }

    async fn destroy(&mut self) -> Result<(), DeployError> {
        self.record()?;
        self.require_docker()?;

        let lock = self.lock()?;
        let result = self.do_destroy().await;
        self.unlock(lock);
        if result.is_ok() {
            tracing::info!(deployment = %self.ctx.name, "destroyed");
        }
        result
    }

    fn take_warnings(&mut self) -> Vec<Warning> {
        self.diagnostics.take()
    }
}
