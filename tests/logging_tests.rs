//! Logging initialisation through the config file.
//!
//! Kept in its own test binary: the global subscriber can only be set once
//! per process.

use std::sync::Arc;

use inputwarden::config::InputConfig;
use inputwarden::platform::simulated::SimulatedPlatform;
use inputwarden::{CurrentWindow, InputContext, logging};

/// Tests `debug_logging` from the config file installs a debug-level
/// subscriber, and a second initialisation keeps it.
#[test]
fn test_from_config_initialises_debug_logging() {
    // SAFETY: only test in this binary, no other thread reads the environment
    unsafe { std::env::remove_var("RUST_LOG") };

    let config = InputConfig {
        debug_logging: true,
        ..InputConfig::default()
    };
    let _ctx = InputContext::from_config(
        Arc::new(SimulatedPlatform::new()),
        Arc::new(CurrentWindow::default()),
        &config,
    )
    .expect("Failed to build context");

    assert!(tracing::dispatcher::has_been_set());
    assert!(tracing::enabled!(tracing::Level::DEBUG));
    assert!(!tracing::enabled!(tracing::Level::TRACE));

    assert!(!logging::init(false), "existing subscriber is kept");
    assert!(tracing::enabled!(tracing::Level::DEBUG));
}
