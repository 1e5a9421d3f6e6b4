// system-tests/src/logging.rs
// ============================================================================
// Module: Test Logging
// Description: Process-wide tracing subscriber for system tests.
// Purpose: Route client and scenario events to stderr under `RUST_LOG`.
// Dependencies: tracing-subscriber
// ============================================================================

//! Tracing setup shared by every system-test binary.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,cachito_client=debug,system_tests=debug";

/// Installs the fmt subscriber once per process; later calls are no-ops.
pub fn init_tracing() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
