// ABOUTME: On-disk backup artifacts: gzip-compressed SQL dumps under <work_dir>/backups.
// ABOUTME: Handles writing, reading back, listing in id order and retention pruning.

use chrono::{DateTime, Duration, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::provider::BackupArtifact;
use crate::types::BackupId;

pub const BACKUP_DIR: &str = "backups";

pub fn backup_dir(work_dir: &Path) -> PathBuf {
    work_dir.join(BACKUP_DIR)
}

pub fn artifact_path(work_dir: &Path, id: &BackupId) -> PathBuf {
    backup_dir(work_dir).join(id.file_name())
}

/// Compress `sql` into a new artifact. Never overwrites an existing file.
///
/// A write that fails midway removes the partial file; if that removal fails too it lands in `diag`.
pub fn write_artifact(
    work_dir: &Path,
    id: &BackupId,
    sql: &[u8],
    diag: &mut Diagnostics,
) -> std::io::Result<BackupArtifact> {
    let dir = backup_dir(work_dir);
    std::fs::create_dir_all(&dir)?;
    super::envfile::set_mode(&dir, 0o750)?;

    let path = artifact_path(work_dir, id);
    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let written = (|| {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(sql)?;
        let file = encoder.finish()?;
        file.sync_all()?;
        file.metadata().map(|m| m.len())
    })();

    match written {
        Ok(size) => Ok(BackupArtifact {
            id: id.clone(),
            size,
            path,
        }),
        Err(e) => {
            discard_partial(&path, diag);
            Err(e)
        }
    }
}

/// A truncated artifact would later restore garbage, so it must not stay behind silently.
fn discard_partial(path: &Path, diag: &mut Diagnostics) {
    let removed = match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    };
    diag.best_effort(
        WarningKind::PartialBackupRemoval,
        &format!("failed to remove partial backup {}", path.display()),
        removed,
    );
}

/// Decompress an artifact into memory.
pub fn read_artifact(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut sql = Vec::new();
    GzDecoder::new(file).read_to_end(&mut sql)?;
    Ok(sql)
}

/// All artifacts, oldest first. A missing directory means no backups.
pub fn list_artifacts(work_dir: &Path) -> std::io::Result<Vec<BackupArtifact>> {
    let dir = backup_dir(work_dir);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Some(id) = entry.file_name().to_str().and_then(BackupId::from_file_name) else {
            continue;
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        artifacts.push(BackupArtifact {
            id,
            size: metadata.len(),
            path: entry.path(),
        });
    }
    artifacts.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(artifacts)
}

/// Delete artifacts older than `retention_days` relative to `now`, sparing `keep`.
///
/// Failures are recorded in `diag`; returns the ids actually removed.
pub fn prune(
    work_dir: &Path,
    retention_days: u32,
    now: DateTime<Utc>,
    keep: &BackupId,
    diag: &mut Diagnostics,
) -> Vec<BackupId> {
    let cutoff = now - Duration::days(i64::from(retention_days));
    let Some(artifacts) = diag.best_effort(
        WarningKind::BackupPrune,
        "failed to list backups for pruning",
        list_artifacts(work_dir),
    ) else {
        return Vec::new();
    };

    let mut removed = Vec::new();
    for artifact in artifacts {
        if &artifact.id == keep || artifact.id.timestamp() >= cutoff {
            continue;
        }
        let context = format!("failed to prune backup {}", artifact.id);
        if diag
            .best_effort(WarningKind::BackupPrune, &context, std::fs::remove_file(&artifact.path))
            .is_some()
        {
            tracing::info!(backup = %artifact.id, "pruned backup past retention");
            removed.push(artifact.id);
        }
    }
    removed
}
