//! Common `tracing` logger configuration for wallet-core services and
//! tests.

// Enforce disallowed methods clippy lint
#![deny(clippy::disallowed_methods)]

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Initialize a global `tracing` logger.
///
/// - Prints enabled events and spans to stdout.
/// - Defaults to INFO and above; override per-target with `RUST_LOG`.
///
/// Panics if a global logger is already set, so don't call this from tests;
/// use [`init_for_testing`] there instead.
pub fn init() {
    try_init().expect("Failed to set up logger");
}

/// Logger initialization for tests: no-op without `RUST_LOG`, and tolerant
/// of the many test threads racing to set the global default.
pub fn init_for_testing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = try_init();
}

/// Try to initialize a global logger; `Err` if one is already set.
pub fn try_init() -> Result<(), TryInitError> {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|directives| Targets::from_str(&directives).ok())
        .unwrap_or_else(|| Targets::new().with_default(Level::INFO));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_level(true)
        .with_target(true)
        .with_ansi(true)
        .with_filter(filter);

    tracing_subscriber::registry().with(stdout_layer).try_init()
}
