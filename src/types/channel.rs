// ABOUTME: Release channels a deployment can follow.
// ABOUTME: Parsed from operator input and stored in the deployment record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Nightly,
    Dev,
    Beta,
    #[default]
    Release,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Release,
        Channel::Beta,
        Channel::Dev,
        Channel::Nightly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Nightly => "nightly",
            Channel::Dev => "dev",
            Channel::Beta => "beta",
            Channel::Release => "release",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown release channel '{0}' (expected release, beta, dev or nightly)")]
pub struct ChannelError(String);

impl FromStr for Channel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nightly" => Ok(Channel::Nightly),
            "dev" => Ok(Channel::Dev),
            "beta" => Ok(Channel::Beta),
            "release" | "released" | "stable" => Ok(Channel::Release),
            _ => Err(ChannelError(s.to_string())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Beta".parse::<Channel>().unwrap(), Channel::Beta);
        assert_eq!("stable".parse::<Channel>().unwrap(), Channel::Release);
        assert!("weekly".parse::<Channel>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for channel in Channel::ALL {
            assert_eq!(channel.to_string().parse::<Channel>().unwrap(), channel);
        }
    }
}
