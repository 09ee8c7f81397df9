// ABOUTME: Diagnostics accumulator for non-fatal warnings during lifecycle and self-update runs.
// ABOUTME: Best-effort cleanup routes its discarded errors here instead of dropping them.

use std::fmt::Display;

/// Collects non-fatal warnings during an operation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Run-and-forget for cleanup steps: an error becomes a warning.
    pub fn best_effort<T, E: Display>(
        &mut self,
        kind: WarningKind,
        context: &str,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.warn(Warning {
                    kind,
                    message: format!("{}: {}", context, e),
                });
                None
            }
        }
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Hand the collected warnings to the caller, leaving this accumulator empty.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A non-fatal warning collected during an operation.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to release deploy lock (lock file may remain).
    LockRelease,
    /// Failed to delete a backup past its retention.
    BackupPrune,
    /// Failed to delete a backup artifact whose write did not complete.
    PartialBackupRemoval,
    /// Failed to remove the previous executable after a self-update.
    OldBinaryRemoval,
    /// Failed to remove a temporary download.
    TempFileRemoval,
    /// Failed to remove a stale file left by an earlier run.
    StaleFileRemoval,
    /// Failed to put the previous image tag back after a failed restart.
    EnvRestore,
}
