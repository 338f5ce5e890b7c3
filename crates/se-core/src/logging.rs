//! Logging bootstrap

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Build the filter used by the subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive()))
}

/// Install the global fmt subscriber. Calling it twice is harmless.
pub fn init(level: LogLevel) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
