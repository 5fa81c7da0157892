//! Logging setup for the binary
//!
//! Logs go to stderr; stdout carries the CSV export.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence; `default_level` (e.g. `warn` or
/// `ledger_reconciler=debug`) is used when it is unset or invalid.
///
/// # Errors
///
/// Returns an error if `default_level` is not a valid filter directive or a
/// global subscriber is already installed.
pub fn init_logging(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
