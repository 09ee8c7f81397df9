// ABOUTME: Health gate timing policy for install, update and rollback.
// ABOUTME: Defaults: probe every 3s, give up after 120s, each probe bounded by 5s.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Overall deadline for the service to report healthy.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause between probes.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Upper bound on a single HTTP probe.
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for HealthPolicy {
    fn default() -> Self {
        HealthPolicy {
            timeout: default_timeout(),
            interval: default_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}
