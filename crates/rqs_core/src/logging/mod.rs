//! Logging infrastructure built on the `tracing` ecosystem.
//!
//! Station-level skips are logged at `warn` with their (network, station,
//! pair) context, quality rejections at `debug`, and run milestones at
//! `info`. The scan itself never writes to stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber for application-wide logging.
///
/// Respects the RUST_LOG environment variable and falls back to the given
/// default directive. Should be called once at application startup.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Initialize tracing for tests (warnings and above, test writer).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
