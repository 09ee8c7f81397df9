// ABOUTME: Integration tests for health gate timing at its boundaries.
// ABOUTME: Uses tokio's paused clock so deadlines are exact.

mod support;

use keel::config::HealthPolicy;
use keel::health::wait_for_healthy;
use std::time::Duration;
use support::probe::{ScriptedProbe, healthy, unhealthy};
use tokio::time::Instant;

fn policy(timeout: u64, interval: u64, probe_timeout: u64) -> HealthPolicy {
    HealthPolicy {
        timeout: Duration::from_secs(timeout),
        interval: Duration::from_secs(interval),
        probe_timeout: Duration::from_secs(probe_timeout),
    }
}

#[tokio::test(start_paused = true)]
async fn healthy_answer_at_the_deadline_is_a_failure() {
    let probe = ScriptedProbe::healthy().with_delay(Duration::from_secs(4));

    let err = wait_for_healthy(&probe, "http://localhost", &policy(4, 1, 5))
        .await
        .unwrap_err();

    assert_eq!(err.waited, Duration::from_secs(4));
    assert_eq!(probe.probes(), 1);
}

#[tokio::test(start_paused = true)]
async fn healthy_answer_just_before_the_deadline_passes() {
    let probe = ScriptedProbe::healthy().with_delay(Duration::from_millis(3999));

    let snapshot = wait_for_healthy(&probe, "http://localhost", &policy(4, 1, 5))
        .await
        .unwrap();

    assert!(snapshot.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn slow_probe_is_cut_off_by_probe_timeout() {
    let probe = ScriptedProbe::healthy().with_delay(Duration::from_secs(30));
    let started = Instant::now();

    let err = wait_for_healthy(&probe, "http://localhost", &policy(12, 3, 5))
        .await
        .unwrap_err();

    assert!(err.last.contains("timed out"));
    assert_eq!(started.elapsed(), Duration::from_secs(12));
    // 0-5s probe, 8-12s probe cut at the deadline
    assert_eq!(probe.probes(), 2);
}

#[tokio::test(start_paused = true)]
async fn recovers_after_connection_errors() {
    let probe = ScriptedProbe::unreachable();
    let err = wait_for_healthy(&probe, "http://localhost", &policy(6, 3, 1))
        .await
        .unwrap_err();
    assert!(err.last.contains("502"));

    let probe = ScriptedProbe::healthy().then([unhealthy(), unhealthy()]);
    let started = Instant::now();
    let snapshot = wait_for_healthy(&probe, "http://localhost", &policy(120, 3, 5))
        .await
        .unwrap();

    assert_eq!(snapshot, healthy("1.0.0"));
    assert_eq!(probe.probes(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}
