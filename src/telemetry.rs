//! Logging initialization.
//!
//! tracing-subscriber with an EnvFilter and a fmt layer. Console output
//! is the subsystem's whole observability surface; there is no metrics
//! or tracing export.

use crate::error::{Error, Result};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the configured default level
/// applies. Fails if a subscriber was already set.
pub fn init_logging(default_level: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Config(format!("failed to init tracing subscriber: {e}")))?;

    Ok(())
}
