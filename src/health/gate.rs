// ABOUTME: Health gate: poll a probe until it reports healthy or the deadline passes.
// ABOUTME: A result that arrives at or after the deadline counts as a failure.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::{HealthProbe, HealthSnapshot};
use crate::config::HealthPolicy;

#[derive(Debug, Error)]
#[error("{url} did not become healthy within {waited:?} (last: {last})")]
pub struct GateTimeout {
    pub url: String,
    pub waited: Duration,
    pub last: String,
}

/// Probe `base_url` every `policy.interval` until healthy.
///
/// Each probe is bounded by the smaller of `policy.probe_timeout` and the time
/// left before the deadline, so the gate never overruns `policy.timeout`.
pub async fn wait_for_healthy<P>(
    probe: &P,
    base_url: &str,
    policy: &HealthPolicy,
) -> Result<HealthSnapshot, GateTimeout>
where
    P: HealthProbe + ?Sized,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut last = "no probe completed".to_string();
    let mut attempts = 0u32;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        let bound = (deadline - now).min(policy.probe_timeout);
        attempts += 1;

        match tokio::time::timeout(bound, probe.probe(base_url)).await {
            Ok(Ok(snapshot)) => {
                if Instant::now() >= deadline {
                    last = "response arrived at the deadline".to_string();
                    break;
                }
                if snapshot.is_healthy() {
                    tracing::info!(url = base_url, attempts, "service healthy");
                    return Ok(snapshot);
                }
                last = snapshot.describe();
            }
            Ok(Err(e)) => last = e.to_string(),
            Err(_) => last = format!("probe timed out after {:?}", bound),
        }
        tracing::debug!(url = base_url, attempts, reason = %last, "not healthy yet");

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(policy.interval.min(deadline - now)).await;
    }

    Err(GateTimeout {
        url: base_url.to_string(),
        waited: policy.timeout,
        last,
    })
}
