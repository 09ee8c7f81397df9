// ABOUTME: Application-wide error types for keel.
// ABOUTME: Wraps each subsystem's error so the CLI reports one type and exits 1.

use thiserror::Error;

use crate::config::StoreError;
use crate::deploy::{DeployError, DeployErrorKind};
use crate::registry::RegistryError;
use crate::selfupdate::SelfUpdateError;
use crate::types::{ChannelError, DeploymentNameError, ParseImageRefError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("self-update failed: {0}")]
    SelfUpdate(#[from] SelfUpdateError),

    #[error("invalid deployment name: {0}")]
    Name(#[from] DeploymentNameError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("invalid image: {0}")]
    Image(#[from] ParseImageRefError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no {0} release found")]
    NoRelease(String),

    #[error("aborted")]
    Aborted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Coarse error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or missing preconditions; nothing was changed.
    Usage,
    /// A lifecycle operation failed.
    Deploy(DeployErrorKind),
    Network,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Deploy(e) => ErrorKind::Deploy(e.kind()),
            Error::Store(e) if e.is_not_installed() => ErrorKind::Usage,
            Error::Store(_) | Error::Io(_) | Error::Yaml(_) => ErrorKind::Io,
            Error::Registry(_) | Error::NoRelease(_) => ErrorKind::Network,
            Error::SelfUpdate(e) => match e.kind() {
                crate::selfupdate::SelfUpdateErrorKind::Filesystem => ErrorKind::Io,
                _ => ErrorKind::Network,
            },
            Error::Name(_)
            | Error::Channel(_)
            | Error::Image(_)
            | Error::InvalidArgument(_)
            | Error::Aborted => ErrorKind::Usage,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
