//! Logging setup

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level
pub fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Install the global fmt subscriber. Later calls are no-ops.
pub fn init(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .try_init();
}
