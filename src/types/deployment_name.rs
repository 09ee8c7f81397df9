// ABOUTME: Validated deployment name used as the record key and working directory name.
// ABOUTME: Restricted to lowercase DNS-label characters so it is always a safe path component.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Name used when the operator does not give one.
pub const DEFAULT_DEPLOYMENT: &str = "default";

#[derive(Debug, Error)]
pub enum DeploymentNameError {
    #[error("deployment name cannot be empty")]
    Empty,

    #[error("deployment name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("deployment name cannot start or end with a hyphen")]
    EdgeHyphen,

    #[error("deployment name must be lowercase")]
    NotLowercase,

    #[error("invalid character in deployment name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentName(String);

impl DeploymentName {
    pub fn new(value: &str) -> Result<Self, DeploymentNameError> {
        if value.is_empty() {
            return Err(DeploymentNameError::Empty);
        }

        if value.len() > 63 {
            return Err(DeploymentNameError::TooLong);
        }

        if value.starts_with('-') || value.ends_with('-') {
            return Err(DeploymentNameError::EdgeHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(DeploymentNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(DeploymentNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeploymentName {
    fn default() -> Self {
        Self(DEFAULT_DEPLOYMENT.to_string())
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DeploymentName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeploymentName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DeploymentName::new(&s).map_err(serde::de::Error::custom)
    }
}
