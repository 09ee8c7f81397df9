// ABOUTME: Container image reference parsing for the application image.
// ABOUTME: Splits "registry/name:tag" so the tag can be managed separately from the repository.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("image reference must not pin a digest: {0}")]
    Digest(String),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// An image reference whose tag is tracked apart from its repository.
///
/// Deployments record the repository once and rewrite only the tag on update,
/// so digests are rejected: a pinned digest would silently ignore tag changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        if input.contains('@') {
            return Err(ParseImageRefError::Digest(input.to_string()));
        }

        // A colon after the last slash is a tag; one before it belongs to a registry port.
        let (without_tag, tag) = match input.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => {
                if after.is_empty() {
                    return Err(ParseImageRefError::InvalidFormat(input.to_string()));
                }
                (before, Some(after.to_string()))
            }
            _ => (input, None),
        };

        let (registry, name) = match without_tag.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest.to_string())
            }
            _ => (None, without_tag.to_string()),
        };

        if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            registry,
            name,
            tag,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag given in the reference, if any. No implicit "latest".
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The reference without its tag, e.g. `ghcr.io/org/app`.
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.name),
            None => self.name.clone(),
        }
    }

    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            name: self.name.clone(),
            tag: Some(tag.to_string()),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository())?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_name_and_tag() {
        let img = ImageRef::parse("ghcr.io/org/app:1.0.0").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/app");
        assert_eq!(img.tag(), Some("1.0.0"));
        assert_eq!(img.repository(), "ghcr.io/org/app");
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let img = ImageRef::parse("localhost:5000/app").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.tag(), None);
    }

    #[test]
    fn bare_name_has_no_registry() {
        let img = ImageRef::parse("library/nginx").unwrap();
        assert!(img.registry().is_none());
        assert_eq!(img.name(), "library/nginx");
    }

    #[test]
    fn digest_is_rejected() {
        assert!(matches!(
            ImageRef::parse("nginx@sha256:abc"),
            Err(ParseImageRefError::Digest(_))
        ));
    }

    #[test]
    fn with_tag_replaces_tag() {
        let img = ImageRef::parse("ghcr.io/x/y:old").unwrap().with_tag("new");
        assert_eq!(img.to_string(), "ghcr.io/x/y:new");
    }

    #[test]
    fn empty_tag_is_invalid() {
        assert!(ImageRef::parse("app:").is_err());
    }
}
