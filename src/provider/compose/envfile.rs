// ABOUTME: Reads and rewrites single entries of the deployment's .env file.
// ABOUTME: Rewrites are key-scoped and atomic, and the file always stays owner-only.

use std::io::Write;
use std::path::Path;

use crate::deploy::DeployError;

/// Entry holding the running application tag.
pub const IMAGE_TAG_KEY: &str = "APP_IMAGE_TAG";

pub const ENV_FILENAME: &str = ".env";

/// Value of `key` in dotenv-formatted `content`. The first assignment wins.
pub fn parse_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.trim_start();
        if line.starts_with('#') {
            return None;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| unquote(v.trim()).to_string())
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

pub fn read_value(path: &Path, key: &str) -> Result<Option<String>, DeployError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DeployError::io(format!("failed to read {}", path.display()), e))?;
    Ok(parse_value(&content, key))
}

/// Read `key`, failing when the entry is gone.
pub fn require_value(path: &Path, key: &'static str) -> Result<String, DeployError> {
    read_value(path, key)?.ok_or_else(|| DeployError::EnvFileDrift {
        path: path.to_path_buf(),
        key,
    })
}

/// Rewrite the `key` entry from `old` to `new`, leaving every other line as it was.
///
/// Fails with `EnvFileDrift` when the entry is missing or no longer holds `old`.
pub fn replace_value(path: &Path, key: &'static str, old: &str, new: &str) -> Result<(), DeployError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DeployError::io(format!("failed to read {}", path.display()), e))?;

    let mut replaced = false;
    let mut out = String::with_capacity(content.len() + new.len());
    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let is_entry = !replaced
            && body
                .split_once('=')
                .is_some_and(|(k, v)| k.trim() == key && unquote(v.trim()) == old);
        if is_entry {
            out.push_str(&format!("{}={}", key, new));
            out.push_str(&line[body.len()..]);
            replaced = true;
        } else {
            out.push_str(line);
        }
    }

    if !replaced {
        return Err(DeployError::EnvFileDrift {
            path: path.to_path_buf(),
            key,
        });
    }

    write_file(path, &out, 0o600)
        .map_err(|e| DeployError::io(format!("failed to write {}", path.display()), e))?;
    tracing::debug!(path = %path.display(), key, old, new, "rewrote env entry");
    Ok(())
}

/// Replace `path` atomically with `content` and the given Unix mode.
pub fn write_file(path: &Path, content: &str, mode: u32) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    set_mode(tmp.path(), mode)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# managed\nAPP_IMAGE=ghcr.io/x/y\nAPP_IMAGE_TAG=1.0.0\nNOTE=\"1.0.0 is live\"\n";

    #[test]
    fn parses_plain_and_quoted_values() {
        assert_eq!(parse_value(SAMPLE, "APP_IMAGE_TAG").as_deref(), Some("1.0.0"));
        assert_eq!(parse_value(SAMPLE, "NOTE").as_deref(), Some("1.0.0 is live"));
        assert_eq!(parse_value(SAMPLE, "MISSING"), None);
        assert_eq!(parse_value("# APP_IMAGE_TAG=9\n", "APP_IMAGE_TAG"), None);
    }

    #[test]
    fn replace_touches_only_the_keyed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, SAMPLE).unwrap();

        replace_value(&path, IMAGE_TAG_KEY, "1.0.0", "1.1.0").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("APP_IMAGE_TAG=1.1.0\n"));
        assert!(content.contains("NOTE=\"1.0.0 is live\""));
        assert!(content.starts_with("# managed\n"));
    }

    #[test]
    fn replace_rejects_unexpected_current_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, SAMPLE).unwrap();

        let err = replace_value(&path, IMAGE_TAG_KEY, "0.9.0", "1.1.0").unwrap_err();
        assert!(matches!(err, DeployError::EnvFileDrift { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[cfg(unix)]
    #[test]
    fn written_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        write_file(&path, "A=1\n", 0o600).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
