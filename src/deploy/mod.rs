// ABOUTME: Lifecycle error taxonomy and the advisory deploy lock.
// ABOUTME: Shared by every provider; the lock serializes mutating operations per deployment.

mod error;
mod lock;

pub use error::{DeployError, DeployErrorKind, LockHolderInfo};
pub use lock::{DeployLock, LOCK_FILENAME, LockInfo};
