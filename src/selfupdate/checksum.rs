// ABOUTME: SHA-256 verification of downloaded binaries against a checksums.txt manifest.
// ABOUTME: Manifest lines are "<hex-sha256>  <filename>", as written by sha256sum.

use sha2::{Digest, Sha256};
use snafu::{ResultExt, ensure};
use std::path::Path;

use super::error::{ChecksumMismatchSnafu, HashSnafu, MissingChecksumSnafu, SelfUpdateError};

/// Asset name of the checksum manifest in a release.
pub const MANIFEST_ASSET: &str = "checksums.txt";

/// Expected digest for `asset`, if the manifest lists it.
pub fn expected_digest(manifest: &str, asset: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let (digest, name) = (fields.next()?, fields.next()?);
        if fields.next().is_some() {
            return None;
        }
        // sha256sum marks binary-mode entries with a leading '*'
        let name = name.strip_prefix('*').unwrap_or(name);
        (name == asset).then(|| digest.to_string())
    })
}

pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check `path` against the manifest row for `asset`.
pub fn verify(path: &Path, manifest: &str, asset: &str) -> Result<(), SelfUpdateError> {
    let expected = expected_digest(manifest, asset).ok_or_else(|| {
        MissingChecksumSnafu {
            asset: asset.to_string(),
        }
        .build()
    })?;
    let actual = sha256_file(path).context(HashSnafu { path })?;

    ensure!(
        actual.eq_ignore_ascii_case(&expected),
        ChecksumMismatchSnafu {
            asset,
            expected,
            actual
        }
    );
    tracing::debug!(asset, "checksum verified");
    Ok(())
}
