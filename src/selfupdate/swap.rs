// ABOUTME: Replaces the running executable with a verified download using two renames.
// ABOUTME: The previous binary is kept as <exe>.old until the new one is in place.

use snafu::ResultExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::error::{InstallSnafu, MoveAsideSnafu, PermissionsSnafu, SelfUpdateError, StageSnafu};
use crate::diagnostics::{Diagnostics, WarningKind};

fn sibling(live: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = live.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    live.with_file_name(name)
}

/// Where the previous binary is parked during the swap.
pub fn old_path(live: &Path) -> PathBuf {
    sibling(live, ".old")
}

/// Where the new binary waits, on the same filesystem as the live one.
pub fn staged_path(live: &Path) -> PathBuf {
    sibling(live, ".new")
}

pub(crate) fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Move `new_binary` next to `live`, copying when a rename cannot cross filesystems.
fn stage(live: &Path, new_binary: &Path, diag: &mut Diagnostics) -> Result<PathBuf, SelfUpdateError> {
    let staged = staged_path(live);
    diag.best_effort(
        WarningKind::StaleFileRemoval,
        &format!("failed to remove stale {}", staged.display()),
        remove_if_exists(&staged),
    );

    if let Err(e) = std::fs::rename(new_binary, &staged) {
        tracing::debug!("rename into place failed ({}), copying instead", e);
        std::fs::copy(new_binary, &staged).context(StageSnafu { path: &staged })?;
    }
    make_executable(&staged).context(PermissionsSnafu { path: &staged })?;
    Ok(staged)
}

/// Swap `live` for `new_binary`.
///
/// On failure the live path still holds a working binary: either it was never
/// moved, or the `.old` copy has been renamed back.
pub fn swap_executable(
    live: &Path,
    new_binary: &Path,
    diag: &mut Diagnostics,
) -> Result<(), SelfUpdateError> {
    let staged = stage(live, new_binary, diag)?;
    let old = old_path(live);

    diag.best_effort(
        WarningKind::StaleFileRemoval,
        &format!("failed to remove stale {}", old.display()),
        remove_if_exists(&old),
    );

    if let Err(source) = std::fs::rename(live, &old) {
        diag.best_effort(
            WarningKind::TempFileRemoval,
            &format!("failed to remove {}", staged.display()),
            remove_if_exists(&staged),
        );
        return Err(source).context(MoveAsideSnafu { path: live });
    }

    if let Err(source) = std::fs::rename(&staged, live) {
        if let Err(e) = std::fs::rename(&old, live) {
            tracing::error!(
                "could not restore {} from {}: {}",
                live.display(),
                old.display(),
                e
            );
        }
        diag.best_effort(
            WarningKind::TempFileRemoval,
            &format!("failed to remove {}", staged.display()),
            remove_if_exists(&staged),
        );
        return Err(source).context(InstallSnafu { path: live });
    }

    // Windows keeps the running image locked, so this often fails there.
    diag.best_effort(
        WarningKind::OldBinaryRemoval,
        &format!("failed to remove {}", old.display()),
        remove_if_exists(&old),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_names() {
        let live = Path::new("/usr/local/bin/keel");
        assert_eq!(old_path(live), PathBuf::from("/usr/local/bin/keel.old"));
        assert_eq!(staged_path(live), PathBuf::from("/usr/local/bin/keel.new"));
    }

    #[test]
    fn swaps_and_cleans_up() {
        let bin = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();
        let live = bin.path().join("keel");
        let new = downloads.path().join("keel-update");
        std::fs::write(&live, b"old").unwrap();
        std::fs::write(old_path(&live), b"leftover").unwrap();
        std::fs::write(&new, b"new").unwrap();

        let mut diag = Diagnostics::default();
        swap_executable(&live, &new, &mut diag).unwrap();

        assert_eq!(std::fs::read(&live).unwrap(), b"new");
        assert!(!old_path(&live).exists());
        assert!(!staged_path(&live).exists());
        assert!(!diag.has_warnings());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&live).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn missing_live_binary_leaves_nothing_behind() {
        let bin = tempfile::tempdir().unwrap();
        let live = bin.path().join("keel");
        let new = bin.path().join("download");
        std::fs::write(&new, b"new").unwrap();

        let mut diag = Diagnostics::default();
        let err = swap_executable(&live, &new, &mut diag).unwrap_err();

        assert!(matches!(err, SelfUpdateError::MoveAside { .. }));
        assert!(!staged_path(&live).exists());
    }
}
