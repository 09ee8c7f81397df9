// ABOUTME: Scripted health probe: replays a queue of snapshots, then repeats a fallback.
// ABOUTME: Counts probes and can delay each answer to exercise gate timing.

use async_trait::async_trait;
use keel::health::{HealthError, HealthProbe, HealthSnapshot};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn healthy(version: &str) -> HealthSnapshot {
    HealthSnapshot {
        status: "ok".to_string(),
        version: version.to_string(),
        db: true,
        cache: true,
        profile: "production".to_string(),
        timestamp: "1714564800".to_string(),
    }
}

pub fn unhealthy() -> HealthSnapshot {
    HealthSnapshot {
        status: "error".to_string(),
        db: false,
        ..Default::default()
    }
}

#[derive(Clone)]
pub struct ScriptedProbe {
    queue: Arc<Mutex<VecDeque<HealthSnapshot>>>,
    fallback: Option<HealthSnapshot>,
    delay: Duration,
    probes: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    /// Healthy on every probe.
    pub fn healthy() -> Self {
        Self::with_fallback(Some(healthy("1.0.0")))
    }

    /// Refuses every connection.
    pub fn unreachable() -> Self {
        Self::with_fallback(None)
    }

    /// Answers but never reports healthy.
    pub fn never_healthy() -> Self {
        Self::with_fallback(Some(unhealthy()))
    }

    fn with_fallback(fallback: Option<HealthSnapshot>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            delay: Duration::ZERO,
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve `snapshots` first, in order.
    pub fn then(self, snapshots: impl IntoIterator<Item = HealthSnapshot>) -> Self {
        self.queue.lock().extend(snapshots);
        self
    }

    /// Take `delay` to answer each probe.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, base_url: &str) -> Result<HealthSnapshot, HealthError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.queue.lock().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| HealthError::Status {
                url: format!("{base_url}/health"),
                status: 502,
            })
    }
}
