//! Tracing setup for the binary.
//!
//! The library never installs a subscriber; hosts embedding the driver
//! keep control of their own telemetry stack.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `level` overrides both `RUST_LOG` and
/// the default of `info`.
pub fn init(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
