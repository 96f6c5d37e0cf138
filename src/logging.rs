//! Tracing setup for the `enrollctl` binary and embedding services.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the process that owns stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`, falling back to `default_filter` (e.g. the configured
/// `log_filter`). Output: stderr, compact format.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
