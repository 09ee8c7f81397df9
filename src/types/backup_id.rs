// ABOUTME: Timestamp-derived backup identifiers in UTC "YYYYMMDD-HHMMSS" form.
// ABOUTME: Fixed-width digits make lexicographic order equal chronological order.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

const FORMAT: &str = "%Y%m%d-%H%M%S";

/// File suffix of compressed database dumps.
pub const BACKUP_SUFFIX: &str = ".sql.gz";

#[derive(Debug, Error)]
#[error("invalid backup id '{0}': expected YYYYMMDD-HHMMSS")]
pub struct BackupIdError(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    pub fn parse(value: &str) -> Result<Self, BackupIdError> {
        // chrono accepts single-digit fields; the width check keeps ordering lexicographic.
        if value.len() != 15 {
            return Err(BackupIdError(value.to_string()));
        }
        NaiveDateTime::parse_from_str(value, FORMAT)
            .map(|_| Self(value.to_string()))
            .map_err(|_| BackupIdError(value.to_string()))
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self(time.format(FORMAT).to_string())
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Recover an id from an artifact file name like `20240101-030000.sql.gz`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.strip_suffix(BACKUP_SUFFIX)
            .and_then(|stem| Self::parse(stem).ok())
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, BACKUP_SUFFIX)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        // Validated in every constructor.
        NaiveDateTime::parse_from_str(&self.0, FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
