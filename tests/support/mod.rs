// ABOUTME: Test support utilities.
// ABOUTME: Provides scripted fakes for the command runner, health probe and release feed.

use std::sync::Once;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod fake_runner;
#[allow(dead_code)]
pub mod probe;
#[allow(dead_code)]
pub mod releases;
#[allow(dead_code)]
pub mod workspace;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("keel=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}
