// ABOUTME: Validated domain types shared across the lifecycle engine.
// ABOUTME: Image references, deployment names, backup ids and release channels.

mod backup_id;
mod channel;
mod deployment_name;
mod image_ref;

pub use backup_id::{BACKUP_SUFFIX, BackupId, BackupIdError};
pub use channel::{Channel, ChannelError};
pub use deployment_name::{DEFAULT_DEPLOYMENT, DeploymentName, DeploymentNameError};
pub use image_ref::{ImageRef, ParseImageRefError};
