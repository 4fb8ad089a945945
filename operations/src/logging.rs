//! Tracing setup for binaries and tests embedding the engine.
//!
//! Executions emit `tracing` events under `operation` / `sequence` spans that
//! nest the same way their reports do. Reports are the durable record; these
//! events are diagnostics only and are not persisted.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```bash
/// RUST_LOG=operations=debug cargo test
/// ```
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}
